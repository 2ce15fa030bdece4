use std::io::Write;
use std::time::Duration;

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use super::determinism::DeterminismReport;
use super::ranges::RangeReport;
use super::runner::{EpisodeRecord, PolicySummary};

#[derive(Serialize)]
struct JsonReport<'a> {
    summaries: &'a [PolicySummary],
    episodes: &'a [EpisodeRecord],
}

pub fn generate_console_report(
    out: &mut dyn Write,
    summaries: &[PolicySummary],
    records: &[EpisodeRecord],
    total_duration: Duration,
) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "📊 Policy Rollout Summary".bright_cyan().bold())?;
    writeln!(out, "{}", "=========================".cyan())?;

    let failures = records.iter().filter(|r| r.failed()).count();
    writeln!(out, "Episodes: {}", records.len())?;
    writeln!(out, "Simulator failures: {}", failures.to_string().red())?;
    writeln!(out, "Total time: {total_duration:?}")?;
    writeln!(out)?;

    for summary in summaries {
        let status = if summary.failures == 0 {
            "✅".green()
        } else {
            "⚠️".yellow()
        };
        writeln!(out, "{} {}", status, summary.policy.bold())?;
        writeln!(
            out,
            "   Reward: {:.3} ± {:.3}",
            summary.reward.mean, summary.reward.std
        )?;
        writeln!(
            out,
            "   Irrigation: {:.1} ± {:.1} mm",
            summary.irrigation_mm.mean, summary.irrigation_mm.std
        )?;
        writeln!(
            out,
            "   Final biomass: {:.0} ± {:.0} kg/ha",
            summary.final_biomass.mean, summary.final_biomass.std
        )?;
        writeln!(
            out,
            "   Episodes: {} ({} failed), {:.1} steps on average",
            summary.episodes, summary.failures, summary.steps.mean
        )?;
        writeln!(out, "   Average time: {:?}", summary.average_duration)?;
        writeln!(out)?;
    }

    if let Some(best) = summaries
        .iter()
        .max_by(|a, b| a.reward.mean.total_cmp(&b.reward.mean))
    {
        writeln!(out, "{}", "🏆 Best Policy".bright_yellow().bold())?;
        writeln!(out, "{}", "==============".yellow())?;
        writeln!(
            out,
            "{} ({:.3} mean reward)",
            best.policy.green(),
            best.reward.mean
        )?;
    }
    Ok(())
}

pub fn generate_json_report(
    out: &mut dyn Write,
    summaries: &[PolicySummary],
    records: &[EpisodeRecord],
) -> Result<()> {
    let report = JsonReport {
        summaries,
        episodes: records,
    };
    serde_json::to_writer_pretty(&mut *out, &report)?;
    writeln!(out)?;
    Ok(())
}

pub fn generate_markdown_report(
    out: &mut dyn Write,
    summaries: &[PolicySummary],
    records: &[EpisodeRecord],
) -> Result<()> {
    writeln!(out, "# Cropstep Policy Rollouts\n")?;
    writeln!(out, "## Summary\n")?;
    writeln!(
        out,
        "| Policy | Episodes | Failed | Reward | Irrigation (mm) | Final biomass (kg/ha) |"
    )?;
    writeln!(out, "|---|---|---|---|---|---|")?;
    for s in summaries {
        writeln!(
            out,
            "| {} | {} | {} | {:.3} ± {:.3} | {:.1} ± {:.1} | {:.0} ± {:.0} |",
            s.policy,
            s.episodes,
            s.failures,
            s.reward.mean,
            s.reward.std,
            s.irrigation_mm.mean,
            s.irrigation_mm.std,
            s.final_biomass.mean,
            s.final_biomass.std
        )?;
    }

    writeln!(out, "\n## Episodes\n")?;
    for r in records {
        let status = if r.failed() { "❌" } else { "✅" };
        writeln!(
            out,
            "- {status} **{}** seed {} #{} at {} planted {}: {} steps, reward {:.3}, {:.1} mm in {} events ({})",
            r.policy,
            r.seed,
            r.episode,
            r.location,
            r.planting_date,
            r.steps,
            r.total_reward,
            r.total_irrigation_mm,
            r.irrigation_events,
            r.termination
        )?;
        if let Some(detail) = &r.error_detail {
            writeln!(out, "  - {detail}")?;
        }
    }
    Ok(())
}

pub fn generate_csv_report(out: &mut dyn Write, records: &[EpisodeRecord]) -> Result<()> {
    writeln!(
        out,
        "policy,seed,episode,location,planting_date,steps,total_reward,total_irrigation_mm,irrigation_events,coerced_actions,final_biomass,final_stage,termination"
    )?;
    for r in records {
        writeln!(
            out,
            "{},{},{},\"{}\",{},{},{:.6},{:.3},{},{},{:.3},{:.4},{}",
            r.policy,
            r.seed,
            r.episode,
            r.location,
            r.planting_date,
            r.steps,
            r.total_reward,
            r.total_irrigation_mm,
            r.irrigation_events,
            r.coerced_actions,
            r.final_biomass,
            r.final_stage,
            r.termination
        )?;
    }
    Ok(())
}

pub fn generate_determinism_report(out: &mut dyn Write, reports: &[DeterminismReport]) -> Result<()> {
    writeln!(out, "{}", "🔁 Determinism Check".bright_cyan().bold())?;
    writeln!(out, "{}", "====================".cyan())?;
    for report in reports {
        let status = if report.matches() {
            "✅ MATCH".green()
        } else {
            "❌ DIFFER".red()
        };
        writeln!(
            out,
            "{status} {} seed {}: {} steps, trajectory {:016x}, log {}",
            report.policy,
            report.seed,
            report.first.steps,
            report.first.trajectory_hash,
            &report.first.log_digest_hex()[..16]
        )?;
        if !report.matches() {
            writeln!(
                out,
                "   replay: {} steps, trajectory {:016x}, log {}",
                report.second.steps,
                report.second.trajectory_hash,
                &report.second.log_digest_hex()[..16]
            )?;
        }
    }
    Ok(())
}

pub fn generate_range_report(out: &mut dyn Write, report: &RangeReport) -> Result<()> {
    writeln!(
        out,
        "Scanned {} log files, {} logged rows",
        report.files.len(),
        report.rows
    )?;
    writeln!(out, "{}", "-".repeat(72))?;
    writeln!(out, "{:<35} | {:>10} | {:>10} | {:>10}", "FEATURE", "MIN", "MAX", "MEAN")?;
    writeln!(out, "{}", "-".repeat(72))?;
    for range in &report.columns {
        writeln!(
            out,
            "{:<35} | {:>10.2} | {:>10.2} | {:>10.2}",
            range.column, range.min, range.max, range.mean
        )?;
    }
    writeln!(out, "{}", "-".repeat(72))?;
    if report.negative_soil_water() {
        writeln!(
            out,
            "{}",
            "⚠️  Negative soil moisture detected; check the simulator.".red()
        )?;
    } else {
        writeln!(out, "{}", "✅ Soil moisture ranges are non-negative.".green())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::runner::{Stat, summarize};

    fn record(policy: &str, reward: f64, failed: bool) -> EpisodeRecord {
        EpisodeRecord {
            policy: policy.to_string(),
            seed: 7,
            episode: 0,
            location: "12.38,78.93".to_string(),
            planting_date: "2014-06-02".to_string(),
            steps: 40,
            total_reward: reward,
            total_irrigation_mm: 75.0,
            irrigation_events: 3,
            coerced_actions: 1,
            final_biomass: 2_500.0,
            final_stage: 0.45,
            termination: if failed { "simulation_failed" } else { "season_length" }.to_string(),
            error_detail: failed.then(|| "simulator reported an error: boom".to_string()),
            sentinel_steps: 0,
            duration: Duration::from_millis(12),
        }
    }

    fn render(f: impl FnOnce(&mut dyn Write) -> Result<()>) -> String {
        let mut buffer = Vec::new();
        f(&mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn console_report_names_best_policy() {
        let records = vec![record("none", -2.0, false), record("threshold", 4.0, false)];
        let summaries = summarize(&records);
        let text = render(|out| generate_console_report(out, &summaries, &records, Duration::ZERO));
        assert!(text.contains("Policy Rollout Summary"));
        assert!(text.contains("Best Policy"));
        assert!(text.contains("threshold"));
    }

    #[test]
    fn json_report_contains_summaries_and_episodes() {
        let records = vec![record("fixed", 1.0, false)];
        let summaries = summarize(&records);
        let text = render(|out| generate_json_report(out, &summaries, &records));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["summaries"][0]["policy"], "fixed");
        assert_eq!(value["episodes"][0]["termination"], "season_length");
    }

    #[test]
    fn markdown_report_lists_failures() {
        let records = vec![record("random", -200.0, true)];
        let summaries = summarize(&records);
        let text = render(|out| generate_markdown_report(out, &summaries, &records));
        assert!(text.starts_with("# Cropstep Policy Rollouts"));
        assert!(text.contains("| random | 1 | 1 |"));
        assert!(text.contains("boom"));
    }

    #[test]
    fn csv_report_has_one_line_per_episode() {
        let records = vec![record("none", 0.5, false), record("none", 0.25, false)];
        let text = render(|out| generate_csv_report(out, &records));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("policy,seed,episode"));
        assert!(lines[1].starts_with("none,7,0,\"12.38,78.93\",2014-06-02,40,0.500000"));
    }

    #[test]
    fn stat_defaults_render() {
        let summary = PolicySummary {
            policy: "none".to_string(),
            episodes: 0,
            failures: 0,
            reward: Stat::default(),
            irrigation_mm: Stat::default(),
            final_biomass: Stat::default(),
            steps: Stat::default(),
            average_duration: Duration::ZERO,
        };
        let text = render(|out| generate_markdown_report(out, &[summary], &[]));
        assert!(text.contains("| none | 0 | 0 | 0.000 ± 0.000 |"));
    }
}
