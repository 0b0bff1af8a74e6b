//! Plain-text rendering of command results

use chrono::{DateTime, Utc};
use shiftwatch_api::{ShiftCommand, ShiftStatus, UserTotal};
use shiftwatch_core::{
    ActiveShiftRow, Coverage, PageView, PilotGlobalStats, ServerDirectoryEntry, ShiftOutcome,
    ShiftReport, TransitionRejection, UserShiftSummary,
};
use shiftwatch_util::{elapsed_between, format_datetime_full, format_hms};
use std::fmt::Write;

/// Message shown to the member when a command is refused
pub fn rejection_message(rejection: TransitionRejection) -> &'static str {
    match rejection {
        TransitionRejection::AlreadyActive => "You already have a shift in progress. End it before starting a new one.",
        TransitionRejection::AlreadyPaused => "Your shift is already paused.",
        TransitionRejection::NotPaused => "Your shift is not paused.",
        TransitionRejection::AlreadyEnded => "Your last shift has already ended.",
        TransitionRejection::NoActiveShift => "You don't have an active shift.",
    }
}

pub fn outcome(command: ShiftCommand, outcome: &ShiftOutcome) -> String {
    let id = outcome.shift_id.short();
    let mut out = match command {
        ShiftCommand::Start => format!("Shift {} started", id),
        ShiftCommand::Pause => format!(
            "Shift {} paused ({} on duty)",
            id,
            format_hms(outcome.active_duration)
        ),
        ShiftCommand::Resume => format!("Shift {} resumed", id),
        ShiftCommand::End => format!(
            "Shift {} ended after {}",
            id,
            format_hms(outcome.active_duration)
        ),
    };
    if let Some(deadline) = outcome.auto_end_at {
        let _ = write!(out, "; auto-ends at {}", format_datetime_full(&deadline));
    }
    out
}

pub fn report(report: &ShiftReport) -> String {
    let status = match &report.status {
        ShiftStatus::Unknown => "No shifts recorded".to_string(),
        ShiftStatus::Active { shift_id, started_at } => format!(
            "On shift {} since {} ({})",
            shift_id.short(),
            format_datetime_full(started_at),
            format_hms(report.current_duration)
        ),
        ShiftStatus::Paused { shift_id, paused_at, .. } => format!(
            "Shift {} paused since {} ({} on duty)",
            shift_id.short(),
            format_datetime_full(paused_at),
            format_hms(report.current_duration)
        ),
        ShiftStatus::Ended { shift_id, ended_at, auto_ended } => format!(
            "Off duty; shift {} ended {}{}",
            shift_id.short(),
            format_datetime_full(ended_at),
            if *auto_ended { " (auto-ended)" } else { "" }
        ),
    };
    format!("{}\nTotal time: {}", status, format_hms(report.completed_total))
}

pub fn shift_leaderboard(title: &str, view: &PageView<'_, UserTotal>) -> String {
    let mut out = format!("{}\n", title);
    if view.is_empty() {
        out.push_str("No leaderboard data available.\n");
    }
    for (rank, entry) in view.ranked() {
        let _ = writeln!(out, "{:>3}. {:<24} {}", rank, entry.user_id, format_hms(entry.total));
    }
    let _ = write!(out, "{}", view.footer());
    out
}

pub fn coverage_note(coverage: &Coverage) -> Option<String> {
    if coverage.is_complete() {
        return None;
    }
    let guilds: Vec<&str> = coverage.skipped.iter().map(|s| s.guild_id.as_str()).collect();
    Some(format!(
        "Partial data: {}/{} servers contributed (skipped: {})",
        coverage.contributed,
        coverage.attempted,
        guilds.join(", ")
    ))
}

pub fn pilot_board(view: &PageView<'_, PilotGlobalStats>) -> String {
    let mut out = String::from("Global pilot leaderboard\n");
    if view.is_empty() {
        out.push_str("No flight data found.\n");
    }
    for (_, pilot) in view.ranked() {
        let _ = writeln!(
            out,
            "{:>3}. {:<24} {} flights",
            pilot.global_rank, pilot.user_id, pilot.total_flights
        );
    }
    let _ = write!(out, "{}", view.footer());
    out
}

pub fn pilot(stats: &PilotGlobalStats) -> String {
    let mut out = format!(
        "Pilot {}\nTotal flights: {}\nGlobal rank: #{} of {}\n",
        stats.user_id, stats.total_flights, stats.global_rank, stats.total_pilots
    );
    for (guild, flights) in &stats.per_guild_flight_counts {
        let _ = writeln!(out, "  {}: {} flights", guild, flights);
    }
    out.trim_end().to_string()
}

pub fn servers(view: &PageView<'_, ServerDirectoryEntry>) -> String {
    let mut out = String::from("Servers\n");
    if view.is_empty() {
        out.push_str("No servers known.\n");
    }
    for (rank, server) in view.ranked() {
        let _ = writeln!(
            out,
            "{:>3}. {:<32} {} members",
            rank, server.name, server.member_count
        );
    }
    let _ = write!(out, "{}", view.footer());
    out
}

pub fn active_shifts(rows: &[ActiveShiftRow], now: DateTime<Utc>) -> String {
    if rows.is_empty() {
        return "No active shifts.".to_string();
    }
    let mut out = String::from("Active shifts\n");
    for row in rows {
        let _ = writeln!(
            out,
            "{:<24} {} {} (started {} ago){}",
            row.user_id,
            row.shift_id.short(),
            format_hms(row.active_duration),
            format_hms(elapsed_between(row.started_at, now)),
            if row.paused { " [paused]" } else { "" }
        );
    }
    out.trim_end().to_string()
}

pub fn summary(summary: &UserShiftSummary) -> String {
    let mut out = format!(
        "Shift stats for {}\nShifts completed: {}\nTotal time: {}\nAverage shift: {}\n",
        summary.user_id,
        summary.completed_shifts,
        format_hms(summary.total_time),
        format_hms(summary.average_time)
    );
    if let Some((id, d)) = &summary.longest {
        let _ = writeln!(out, "Longest shift: {} ({})", format_hms(*d), id.short());
    }
    if let Some((id, d)) = &summary.shortest {
        let _ = writeln!(out, "Shortest shift: {} ({})", format_hms(*d), id.short());
    }
    if let Some(id) = &summary.most_recent {
        let _ = writeln!(out, "Most recent shift: {}", id.short());
    }
    match &summary.current {
        Some(current) => {
            let _ = writeln!(
                out,
                "Current shift: {} {} ({})",
                current.shift_id.short(),
                current.status.label(),
                format_hms(current.active_duration)
            );
        }
        None => out.push_str("Current shift: none\n"),
    }
    if let Some((rank, of)) = summary.rank {
        let _ = writeln!(out, "Server rank: #{} of {}", rank, of);
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shiftwatch_core::paginate;
    use shiftwatch_util::UserId;
    use std::time::Duration;

    #[test]
    fn leaderboard_lists_ranks_and_footer() {
        let entries: Vec<UserTotal> = (1..=12)
            .map(|i| UserTotal::new(UserId::new(format!("user{}", i)), Duration::from_secs(3600 * (13 - i))))
            .collect();
        let text = shift_leaderboard("Shifts", &paginate(&entries, 10, 2));

        assert!(text.contains(" 11. user11"));
        assert!(text.contains("02:00:00"));
        assert!(text.ends_with("Page 2/2"));
    }

    #[test]
    fn empty_leaderboard_shows_placeholder() {
        let entries: Vec<UserTotal> = Vec::new();
        let text = shift_leaderboard("Shifts", &paginate(&entries, 10, 1));
        assert!(text.contains("No leaderboard data available."));
        assert!(text.ends_with("Page 1/1"));
    }

    #[test]
    fn complete_coverage_has_no_note() {
        assert!(coverage_note(&Coverage::default()).is_none());
    }
}
