use crate::domain::services::listing::{Page, SortState};
use crate::domain::services::status_badge::StatusBadge;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Cell {
    Text { value: String },
    Badge { badge: StatusBadge },
    Link { href: String, label: String },
    /// An operation for this row is in flight.
    Spinner,
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text {
            value: value.into(),
        }
    }
}

pub struct Column<'a, T> {
    pub id: &'static str,
    pub header: &'static str,
    pub sortable: bool,
    render: Box<dyn Fn(&T) -> Cell + 'a>,
}

impl<'a, T> Column<'a, T> {
    pub fn new(id: &'static str, header: &'static str, render: impl Fn(&T) -> Cell + 'a) -> Self {
        Self {
            id,
            header,
            sortable: false,
            render: Box::new(render),
        }
    }

    #[must_use]
    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaderView {
    pub id: &'static str,
    pub header: &'static str,
    pub sortable: bool,
    pub sort: Option<SortDirection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaginationView {
    #[serde(rename = "pageIndex")]
    pub page_index: usize,
    #[serde(rename = "pageCount")]
    pub page_count: usize,
    #[serde(rename = "hasPrevious")]
    pub has_previous: bool,
    #[serde(rename = "hasNext")]
    pub has_next: bool,
}

impl<T> From<&Page<T>> for PaginationView {
    fn from(page: &Page<T>) -> Self {
        Self {
            page_index: page.page_index,
            page_count: page.page_count,
            has_previous: page.has_previous(),
            has_next: page.has_next(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableView {
    pub headers: Vec<HeaderView>,
    pub rows: Vec<Vec<Cell>>,
    pub pagination: Option<PaginationView>,
}

/// Renders `rows` through `columns`. Only sortable columns carry a sort
/// indicator.
pub fn render<T>(columns: &[Column<'_, T>], rows: &[T], sort: Option<&SortState>) -> TableView {
    let headers = columns
        .iter()
        .map(|column| HeaderView {
            id: column.id,
            header: column.header,
            sortable: column.sortable,
            sort: sort
                .filter(|sort| column.sortable && sort.column == column.id)
                .map(|sort| {
                    if sort.desc {
                        SortDirection::Desc
                    } else {
                        SortDirection::Asc
                    }
                }),
        })
        .collect();

    let rows = rows
        .iter()
        .map(|row| columns.iter().map(|column| (column.render)(row)).collect())
        .collect();

    TableView {
        headers,
        rows,
        pagination: None,
    }
}
