use provision_core::{
    ActivityEntry, AggregateCounts, JobSnapshot, Notification, Severity, StageRow, StageStatus,
};
use provision_engine::Diagnostics;

pub fn counts_line(counts: &AggregateCounts) -> String {
    format!(
        "Jobs: {} | pending {} | running {} | completed {} | failed {}",
        counts.total, counts.pending, counts.running, counts.completed, counts.failed
    )
}

pub fn job_line(job: &JobSnapshot) -> String {
    let label = if job.provisional {
        format!("{} (provisional)", job.job_id)
    } else {
        job.job_id.clone()
    };
    let stages: Vec<String> = job.stages.iter().map(stage_cell).collect();
    let status = job.status.to_string();
    let mut line = format!("{:<16} {:<9} {:>3}%", label, status, job.overall_progress);
    if !stages.is_empty() {
        line.push_str("  ");
        line.push_str(&stages.join(" "));
    }
    line
}

fn stage_cell(stage: &StageRow) -> String {
    match stage.status {
        StageStatus::Pending => format!("[ ] {}", stage.display_name),
        StageStatus::InProgress => format!("[>] {} {}%", stage.display_name, stage.progress),
        StageStatus::Complete => format!("[x] {}", stage.display_name),
        StageStatus::Error => format!("[!] {}", stage.display_name),
    }
}

pub fn activity_line(entry: &ActivityEntry) -> String {
    let mut line = format!("{} [{}]", entry.timestamp.format("%H:%M:%S"), entry.kind);
    if let Some(job_id) = &entry.job_id {
        line.push(' ');
        line.push_str(job_id);
    }
    if let Some(stage_id) = &entry.stage_id {
        line.push('/');
        line.push_str(stage_id);
    }
    line.push_str(": ");
    line.push_str(&entry.message);
    line
}

pub fn notification_line(notification: &Notification) -> String {
    let tag = match notification.severity {
        Severity::Success => "done",
        Severity::Error => "FAILED",
    };
    format!("*** {} {}: {}", tag, notification.job_id, notification.text)
}

/// Final report printed when input ends.
pub fn summary(
    jobs: &[JobSnapshot],
    counts: &AggregateCounts,
    activity: &[ActivityEntry],
    diagnostics: &Diagnostics,
) -> Vec<String> {
    let mut lines = vec![counts_line(counts)];
    lines.extend(jobs.iter().map(job_line));

    if !activity.is_empty() {
        lines.push(String::new());
        lines.push("Recent activity:".to_string());
        lines.extend(activity.iter().map(|entry| format!("  {}", activity_line(entry))));
    }

    let skipped = diagnostics.malformed + diagnostics.expired + diagnostics.dropped_after_removal;
    if skipped > 0 || diagnostics.transport_errors > 0 {
        lines.push(String::new());
        lines.push(format!(
            "Skipped events: {} malformed, {} expired, {} for removed jobs | transport errors: {}",
            diagnostics.malformed,
            diagnostics.expired,
            diagnostics.dropped_after_removal,
            diagnostics.transport_errors
        ));
    }
    lines
}
