use std::fmt::Write as _;

use client_core::InterviewState;
use shared::protocol::{DashboardSummary, Interview, InterviewFilters, InterviewMetadata, User};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

pub fn user(user: &User) -> String {
    let verified = if user.is_verified { "verified" } else { "unverified" };
    format!(
        "{} <{}>\n  id: {}\n  locale: {}, {verified}\n  member since {}",
        user.full_name,
        user.email,
        user.id,
        user.locale,
        user.created_at.format("%Y-%m-%d"),
    )
}

pub fn interview_list(state: &InterviewState) -> String {
    let mut out = String::new();
    if !state.has_interviews() {
        out.push_str("No interviews found.\n");
    } else {
        let _ = writeln!(
            out,
            "{:<36}  {:<20}  {:<24}  {:<20}  {:<8}  {}",
            "ID", "COMPANY", "ROLE", "STATUS", "MODE", "DATE"
        );
        for interview in &state.interviews {
            let _ = writeln!(
                out,
                "{:<36}  {:<20}  {:<24}  {:<20}  {:<8}  {}",
                interview.id,
                truncate(&interview.company_name, 20),
                truncate(&interview.role_title, 24),
                interview.application_status.label(),
                interview.work_mode.label(),
                interview
                    .interview_date
                    .map(|date| date.format(DATE_FORMAT).to_string())
                    .unwrap_or_else(|| "-".into()),
            );
        }
    }
    let _ = write!(
        out,
        "page {} of {} ({} total)",
        state.current_page,
        state.total_pages().max(1),
        state.total
    );
    if state.has_active_filters() {
        let _ = write!(out, "; filters: {}", filters(&state.filters));
    }
    out
}

fn filters(filters: &InterviewFilters) -> String {
    let mut parts = Vec::new();
    if let Some(status) = filters.status {
        parts.push(format!("status={}", status.label()));
    }
    if let Some(company) = &filters.company {
        parts.push(format!("company~{company}"));
    }
    if let Some(from) = filters.from_date {
        parts.push(format!("from={from}"));
    }
    if let Some(to) = filters.to_date {
        parts.push(format!("to={to}"));
    }
    parts.join(", ")
}

pub fn interview(interview: &Interview) -> String {
    let mut out = format!(
        "{} at {}\n  id: {}\n  status: {}\n  work mode: {}",
        interview.role_title,
        interview.company_name,
        interview.id,
        interview.application_status.label(),
        interview.work_mode.label(),
    );
    let optional = [
        ("about", interview.company_description.clone()),
        ("location", interview.location.clone()),
        (
            "date",
            interview
                .interview_date
                .map(|date| date.format(DATE_FORMAT).to_string()),
        ),
        ("next", interview.next_milestone.clone()),
        ("contact", contact(interview)),
        ("salary", salary(interview)),
        ("language", interview.language.clone()),
        ("travel", interview.travel_requirements.clone()),
        ("notes", interview.notes.clone()),
    ];
    for (label, value) in optional {
        if let Some(value) = value {
            let _ = write!(out, "\n  {label}: {value}");
        }
    }
    let _ = write!(
        out,
        "\n  updated: {}",
        interview.updated_at.format(DATE_FORMAT)
    );
    out
}

fn contact(interview: &Interview) -> Option<String> {
    let parts: Vec<&str> = [
        interview.contact_name.as_deref(),
        interview.contact_email.as_deref(),
        interview.contact_phone.as_deref(),
    ]
    .into_iter()
    .flatten()
    .collect();
    (!parts.is_empty()).then(|| parts.join(", "))
}

fn salary(interview: &Interview) -> Option<String> {
    let currency = interview.currency.as_deref().unwrap_or("");
    let range = match (interview.salary_range_min, interview.salary_range_max) {
        (Some(min), Some(max)) => format!("{min:.0} - {max:.0}"),
        (Some(min), None) => format!("from {min:.0}"),
        (None, Some(max)) => format!("up to {max:.0}"),
        (None, None) => return None,
    };
    Some(format!("{range} {currency}").trim_end().to_string())
}

pub fn dashboard(summary: &DashboardSummary) -> String {
    let stats = &summary.summary;
    let mut out = format!(
        "Interviews: {}  |  Conversion: {:.1}%  |  Success: {:.1}%  |  This week: {}",
        stats.total_interviews, stats.conversion_rate, stats.success_rate, stats.this_week_applications
    );
    if !summary.status_distribution.is_empty() {
        out.push_str("\n\nBy status:");
        for item in &summary.status_distribution {
            let label = item
                .status
                .parse::<shared::domain::ApplicationStatus>()
                .map(|status| status.label().to_string())
                .unwrap_or_else(|_| item.status.clone());
            let _ = write!(out, "\n  {label:<20} {}", item.count);
        }
    }
    if !summary.upcoming_interviews.is_empty() {
        out.push_str("\n\nUpcoming:");
        for upcoming in &summary.upcoming_interviews {
            let when = upcoming
                .interview_date
                .as_deref()
                .and_then(shared::protocol::timestamp::parse)
                .map(|date| date.format(DATE_FORMAT).to_string())
                .unwrap_or_else(|| "unscheduled".into());
            let _ = write!(
                out,
                "\n  {when}  {} - {}",
                upcoming.company_name, upcoming.role_title
            );
        }
    }
    if !summary.recent_activity.is_empty() {
        out.push_str("\n\nRecent activity:");
        for activity in &summary.recent_activity {
            let _ = write!(
                out,
                "\n  {} - {} ({})",
                activity.company_name, activity.role_title, activity.status
            );
        }
    }
    if !summary.insights.is_empty() {
        out.push_str("\n\nInsights:");
        for insight in &summary.insights {
            let _ = write!(out, "\n  * {insight}");
        }
    }
    out
}

pub fn metadata(metadata: &InterviewMetadata) -> String {
    let mut out = String::from("Statuses:");
    for status in &metadata.statuses {
        let _ = write!(out, "\n  {:<20} {}", status.value, status.label);
    }
    out.push_str("\nWork modes:");
    for mode in &metadata.work_modes {
        let _ = write!(out, "\n  {:<20} {}", mode.value, mode.label);
    }
    let _ = write!(out, "\nCurrencies: {}", metadata.currencies.join(", "));
    out
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let mut cut: String = value.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use shared::{
        domain::{ApplicationStatus, InterviewId, UserId, WorkMode},
        protocol::DashboardSummaryStats,
    };
    use uuid::Uuid;

    fn sample_interview() -> Interview {
        let at = Utc.with_ymd_and_hms(2024, 3, 8, 14, 0, 0).unwrap();
        Interview {
            id: InterviewId(Uuid::nil()),
            user_id: UserId(Uuid::nil()),
            company_name: "Acme".into(),
            company_description: None,
            role_title: "Backend Engineer".into(),
            work_mode: WorkMode::Onsite,
            application_status: ApplicationStatus::TechInterview,
            location: Some("Berlin".into()),
            next_milestone: None,
            contact_name: Some("Grace".into()),
            contact_email: Some("grace@acme.test".into()),
            contact_phone: None,
            salary_range_min: Some(80000.0),
            salary_range_max: Some(95000.0),
            currency: Some("EUR".into()),
            language: None,
            travel_requirements: None,
            notes: None,
            interview_date: Some(at),
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn detail_view_lists_only_present_fields() {
        let text = interview(&sample_interview());
        assert!(text.starts_with("Backend Engineer at Acme"));
        assert!(text.contains("status: Technical Interview"));
        assert!(text.contains("work mode: On-site"));
        assert!(text.contains("contact: Grace, grace@acme.test"));
        assert!(text.contains("salary: 80000 - 95000 EUR"));
        assert!(!text.contains("notes:"));
    }

    #[test]
    fn list_footer_reports_pages_and_filters() {
        let state = InterviewState {
            interviews: vec![sample_interview()],
            total: 45,
            current_page: 2,
            filters: InterviewFilters {
                status: Some(ApplicationStatus::Offer),
                ..InterviewFilters::default()
            },
            ..InterviewState::default()
        };
        let text = interview_list(&state);
        assert!(text.contains("Acme"));
        assert!(text.ends_with("page 2 of 3 (45 total); filters: status=Offer"));
    }

    #[test]
    fn empty_list_is_explicit() {
        let text = interview_list(&InterviewState::default());
        assert!(text.starts_with("No interviews found."));
        assert!(text.ends_with("page 1 of 1 (0 total)"));
    }

    #[test]
    fn dashboard_uses_status_labels() {
        let summary = DashboardSummary {
            summary: DashboardSummaryStats {
                total_interviews: 4,
                conversion_rate: 50.0,
                success_rate: 25.0,
                this_week_applications: 1,
            },
            status_distribution: vec![shared::protocol::StatusDistributionItem {
                status: "HR_INTERVIEW".into(),
                count: 2,
            }],
            upcoming_interviews: Vec::new(),
            recent_activity: Vec::new(),
            insights: vec!["Keep going".into()],
        };
        let text = dashboard(&summary);
        assert!(text.contains("Conversion: 50.0%"));
        assert!(text.contains("HR Interview"));
        assert!(text.contains("* Keep going"));
    }

    #[test]
    fn long_names_are_truncated() {
        assert_eq!(truncate("Short", 10), "Short");
        assert_eq!(truncate("A very long company name", 8), "A very …");
    }
}
