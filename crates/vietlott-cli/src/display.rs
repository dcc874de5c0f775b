//! Plain-text run summaries printed to stdout.

use std::fmt::Write as _;

use vietlott_core::{Evaluation, GameDescriptor};
use vietlott_sync::{DispatchReport, MergeReport};

const MAX_TRACE_LINES: usize = 10;

pub fn render_merge_report(report: &MergeReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {} ===", report.game);
    row(&mut out, "pages", format!("{}..={}", report.range.from, report.range.to));
    row(
        &mut out,
        "pages failed",
        format!("{}/{}", report.pages_failed, report.pages_requested),
    );
    row(&mut out, "records fetched", report.fetched);
    row(&mut out, "new records", report.new_records);
    row(&mut out, "total records", report.total_records);
    if let Some(latest) = &report.latest_new {
        row(
            &mut out,
            "latest new draw",
            format!("{} #{} {:?}", latest.date, latest.id, latest.result),
        );
    }
    row(&mut out, "dataset", report.path.display());
    out
}

pub fn render_evaluations(
    game: &str,
    history_len: usize,
    evaluations: &[Evaluation],
    dispatch: DispatchReport,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {game} streak rules ===");
    row(&mut out, "draws", history_len);
    row(&mut out, "rules", evaluations.len());
    row(&mut out, "alerts sent", dispatch.sent);
    if dispatch.failed > 0 {
        row(&mut out, "alerts failed", dispatch.failed);
    }
    let _ = writeln!(out);

    for eval in evaluations {
        let status = if eval.alert.is_some() { "ALERT" } else { "-" };
        let _ = writeln!(
            out,
            "  SoTour {:<6} SoMuonDanh {:<8} streak {:<6} {}",
            eval.rule.streak_threshold, eval.rule.recommended_number, eval.final_streak, status
        );
        if let Some(alert) = &eval.alert {
            let lines: Vec<&str> = alert.trace.lines().collect();
            let skipped = lines.len().saturating_sub(MAX_TRACE_LINES);
            if skipped > 0 {
                let _ = writeln!(out, "      ... {skipped} earlier draws");
            }
            for line in &lines[skipped..] {
                let _ = writeln!(out, "      {line}");
            }
        }
    }
    out
}

pub fn render_games(games: &[GameDescriptor]) -> String {
    let mut out = String::new();
    for game in games {
        let _ = writeln!(out, "{}", game.name);
        row(&mut out, "url", &game.url);
        row(&mut out, "key", &game.key);
        row(&mut out, "threads", game.num_threads);
        row(&mut out, "default index_to", game.default_index_to);
    }
    out
}

fn row(out: &mut String, label: &str, value: impl std::fmt::Display) {
    let _ = writeln!(out, "  {:<26} {}", label, value);
}
