use serde::{Deserialize, Serialize};

/// A column sort request. Clicking a sortable header flips `desc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
    pub column: String,
    pub desc: bool,
}

impl SortState {
    /// Sort state after a click on `column`, given the current one. A new
    /// column starts ascending; the same column flips direction.
    pub fn toggled(current: Option<&SortState>, column: &str) -> SortState {
        let desc = current
            .filter(|sort| sort.column == column)
            .is_some_and(|sort| !sort.desc);
        SortState {
            column: column.to_string(),
            desc,
        }
    }
}

/// One zero-indexed slice of a longer sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(rename = "pageIndex")]
    pub page_index: usize,
    #[serde(rename = "pageSize")]
    pub page_size: usize,
    #[serde(rename = "totalItems")]
    pub total_items: usize,
    #[serde(rename = "pageCount")]
    pub page_count: usize,
}

impl<T> Page<T> {
    pub fn has_previous(&self) -> bool {
        self.page_index > 0
    }

    pub fn has_next(&self) -> bool {
        self.page_index + 1 < self.page_count
    }
}

/// Keeps items whose key contains `needle`, ignoring case. An empty needle
/// keeps everything.
pub fn filter_by_substring<'a, T, F>(items: &'a [T], needle: &str, key: F) -> Vec<&'a T>
where
    F: Fn(&T) -> &str,
{
    let needle = needle.to_lowercase();
    items
        .iter()
        .filter(|item| key(*item).to_lowercase().contains(&needle))
        .collect()
}

/// Slices `items` into the page at `page_index`. Indices past the end yield an
/// empty page with the correct totals.
pub fn paginate<T: Clone>(items: &[T], page_index: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total_items = items.len();
    let start = page_index.saturating_mul(page_size).min(total_items);
    let end = start.saturating_add(page_size).min(total_items);

    Page {
        items: items[start..end].to_vec(),
        page_index,
        page_size,
        total_items,
        page_count: total_items.div_ceil(page_size),
    }
}
