use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Pending,
    Success,
    Failure,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusBadge {
    pub icon: &'static str,
    pub label: &'static str,
    pub tone: Tone,
}

const fn badge(icon: &'static str, label: &'static str, tone: Tone) -> StatusBadge {
    StatusBadge { icon, label, tone }
}

pub const UNKNOWN: StatusBadge = badge("circle-help", "Unknown", Tone::Neutral);

/// Shown for a run that has no conclusion yet.
pub const NO_CONCLUSION: StatusBadge = badge("circle-dashed", "Pending", Tone::Neutral);

const BADGES: &[(&str, StatusBadge)] = &[
    // status
    ("queued", badge("clock", "Queued", Tone::Pending)),
    ("in_progress", badge("clock", "In progress", Tone::Pending)),
    ("waiting", badge("clock", "Waiting", Tone::Pending)),
    ("requested", badge("clock", "Requested", Tone::Pending)),
    ("pending", badge("clock", "Pending", Tone::Pending)),
    ("completed", badge("check-circle", "Completed", Tone::Success)),
    // conclusion
    ("success", badge("check-circle", "Succeeded", Tone::Success)),
    ("failure", badge("circle-x", "Failed", Tone::Failure)),
    ("timed_out", badge("circle-x", "Timed out", Tone::Failure)),
    ("cancelled", badge("ban", "Cancelled", Tone::Pending)),
    ("skipped", badge("bell-off", "Skipped", Tone::Neutral)),
    ("neutral", badge("circle", "Neutral", Tone::Neutral)),
    ("stale", badge("circle", "Stale", Tone::Neutral)),
    ("action_required", badge("alert-circle", "Action required", Tone::Failure)),
];

/// Badge for one raw vocabulary token. Unrecognised tokens get [`UNKNOWN`].
pub fn classify(raw: &str) -> StatusBadge {
    BADGES
        .iter()
        .find(|(token, _)| *token == raw)
        .map_or(UNKNOWN, |(_, badge)| *badge)
}

pub fn classify_conclusion(raw: Option<&str>) -> StatusBadge {
    raw.map_or(NO_CONCLUSION, classify)
}
