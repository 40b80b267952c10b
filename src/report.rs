use std::fmt::Write;

use crate::aggregate::{self, survey_chart};
use crate::config::MemberSource;
use crate::models::{ChartKind, ChartPoint, MultiSelectField};
use crate::survey::{combined_responses, LoadedSurvey};
use crate::table::Table;

const TOP_OBSTACLES: usize = 5;

fn write_series(output: &mut String, series: &[ChartPoint]) {
    if series.is_empty() {
        let _ = writeln!(output, "No data for this chart.");
        return;
    }
    for point in series {
        let _ = writeln!(output, "- {}: {}", point.name, point.value);
    }
}

/// Markdown summary of every member's survey. `surveys` lines up with
/// `members` by position.
pub fn build_report(members: &[MemberSource], surveys: &[LoadedSurvey]) -> String {
    let combined = combined_responses(surveys);
    let mut output = String::new();

    let _ = writeln!(output, "# Walkability Survey Report");
    let _ = writeln!(
        output,
        "Generated from {} survey files ({} responses)",
        surveys.len(),
        combined.len()
    );
    let _ = writeln!(output);

    if combined.is_empty() {
        let _ = writeln!(output, "No survey responses loaded.");
    }

    for (member, survey) in members.iter().zip(surveys) {
        let _ = writeln!(output, "## {}", member.name);
        if !survey.has_data() {
            let _ = writeln!(output, "No survey responses loaded.");
            let _ = writeln!(output);
            continue;
        }
        let format = survey
            .format
            .map(|f| f.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let _ = writeln!(
            output,
            "{} responses ({} format, {} warnings)",
            survey.responses.len(),
            format,
            survey.warnings.len()
        );
        for chart in &member.charts {
            let _ = writeln!(output);
            let _ = writeln!(output, "### {}", chart.title);
            write_series(
                &mut output,
                &survey_chart(&survey.responses, chart.kind, &chart.metric),
            );
        }
        let _ = writeln!(output);
    }

    if !combined.is_empty() {
        let table = Table::from_responses(&combined);
        let _ = writeln!(output, "## Average Footpath Condition by Ward");
        write_series(
            &mut output,
            &aggregate::transform(&table, "footpath_condition", ChartKind::BarByWardAvg),
        );
        let _ = writeln!(output);

        let _ = writeln!(output, "## Top Obstacles Across Members");
        write_series(
            &mut output,
            &aggregate::top_n(
                aggregate::tally_multi_select(&combined, MultiSelectField::Obstacles),
                TOP_OBSTACLES,
            ),
        );
        let _ = writeln!(output);
    }

    let problems: Vec<&LoadedSurvey> = surveys.iter().filter(|s| !s.errors.is_empty()).collect();
    if !problems.is_empty() {
        let _ = writeln!(output, "## Load Problems");
        for survey in problems {
            for error in &survey.errors {
                let _ = writeln!(output, "- {}: {}", survey.path, error);
            }
        }
    }

    output
}
