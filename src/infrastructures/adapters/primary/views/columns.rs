use super::paths::{logs_path, runs_path};
use super::table::{Cell, Column, PaginationView, TableView, render};
use crate::application::use_cases::list_repositories::NAME_COLUMN;
use crate::domain::models::repository::{Repository, RepositoryRef};
use crate::domain::models::run::WorkflowRun;
use crate::domain::services::listing::{Page, SortState};
use crate::domain::services::status_badge::{classify, classify_conclusion};
use std::collections::HashMap;

pub fn repository_columns() -> Vec<Column<'static, Repository>> {
    vec![
        Column::new(NAME_COLUMN, "Name", |repo: &Repository| Cell::Link {
            href: runs_path(&repo.reference()),
            label: repo.name.clone(),
        })
        .sortable(),
        Column::new("owner", "Owner", |repo: &Repository| {
            Cell::text(repo.owner.login.as_str())
        }),
        Column::new("full_name", "Full name", |repo: &Repository| {
            Cell::text(repo.full_name.as_str())
        }),
    ]
}

pub fn repository_table(page: &Page<Repository>, sort: Option<&SortState>) -> TableView {
    TableView {
        pagination: Some(PaginationView::from(page)),
        ..render(&repository_columns(), &page.items, sort)
    }
}

/// The logs column shows a spinner while that run's archive is downloading.
pub fn run_columns<'a>(
    repository: &'a RepositoryRef,
    loading_logs: &'a HashMap<u64, bool>,
) -> Vec<Column<'a, WorkflowRun>> {
    vec![
        Column::new("name", "Workflow", |run: &WorkflowRun| {
            Cell::text(run.name.as_str())
        }),
        Column::new("title", "Title", |run: &WorkflowRun| Cell::Link {
            href: run.html_url.clone(),
            label: run.display_title.clone(),
        }),
        Column::new("branch", "Branch", |run: &WorkflowRun| {
            Cell::text(run.head_branch.as_deref().unwrap_or("-"))
        }),
        Column::new("status", "Status", |run: &WorkflowRun| Cell::Badge {
            badge: classify(&run.status),
        }),
        Column::new("conclusion", "Conclusion", |run: &WorkflowRun| Cell::Badge {
            badge: classify_conclusion(run.conclusion.as_deref()),
        }),
        Column::new("created_at", "Started", |run: &WorkflowRun| {
            Cell::text(run.created_at.format("%Y-%m-%d %H:%M UTC").to_string())
        }),
        Column::new("logs", "Logs", move |run: &WorkflowRun| {
            if loading_logs.get(&run.id).copied().unwrap_or(false) {
                Cell::Spinner
            } else {
                Cell::Link {
                    href: logs_path(repository, run.id),
                    label: "Download".to_string(),
                }
            }
        }),
    ]
}

pub fn run_table(
    repository: &RepositoryRef,
    runs: &[WorkflowRun],
    loading_logs: &HashMap<u64, bool>,
) -> TableView {
    render(&run_columns(repository, loading_logs), runs, None)
}
