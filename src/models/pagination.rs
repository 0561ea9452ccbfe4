use crate::error::app_error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_SORT_FIELD: &str = "created_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(AppError::BadRequest(format!("Unknown sort order '{}'", other))),
        }
    }
}

/// Page sizes offered by the contact list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PageSize {
    Ten,
    #[default]
    TwentyFive,
    Fifty,
    Hundred,
}

impl PageSize {
    pub const ALL: [PageSize; 4] = [PageSize::Ten, PageSize::TwentyFive, PageSize::Fifty, PageSize::Hundred];

    pub fn as_u32(&self) -> u32 {
        match self {
            PageSize::Ten => 10,
            PageSize::TwentyFive => 25,
            PageSize::Fifty => 50,
            PageSize::Hundred => 100,
        }
    }
}

impl TryFrom<u32> for PageSize {
    type Error = AppError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        PageSize::ALL
            .into_iter()
            .find(|size| size.as_u32() == value)
            .ok_or_else(|| AppError::BadRequest(format!("Unsupported page size {} (expected one of 10, 25, 50, 100)", value)))
    }
}

/// The canonical list query sent to `GET /contacts`.
///
/// Every transition goes through the `with_*` methods so the page reset rules
/// hold regardless of which control changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    page: u32,
    page_size: PageSize,
    sort_field: String,
    sort_order: SortOrder,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: PageSize::default(),
            sort_field: DEFAULT_SORT_FIELD.to_string(),
            sort_order: SortOrder::default(),
        }
    }
}

impl ListQuery {
    pub fn new(page_size: PageSize) -> Self {
        Self {
            page_size,
            ..Self::default()
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> PageSize {
        self.page_size
    }

    pub fn sort_field(&self) -> &str {
        &self.sort_field
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    /// Moves to another page; nothing else changes.
    pub fn with_page(&self, page: u32) -> Result<Self, AppError> {
        if page == 0 {
            return Err(AppError::BadRequest("Page numbers start at 1".to_string()));
        }

        Ok(Self { page, ..self.clone() })
    }

    /// Changes the page size and goes back to the first page.
    pub fn with_page_size(&self, page_size: u32) -> Result<Self, AppError> {
        let page_size = PageSize::try_from(page_size)?;
        Ok(Self {
            page: 1,
            page_size,
            ..self.clone()
        })
    }

    /// Changes the sort and goes back to the first page. A missing field or
    /// order clears the sort back to newest-first.
    pub fn with_sort(&self, field: Option<&str>, order: Option<SortOrder>) -> Self {
        let field = field.map(str::trim).filter(|field| !field.is_empty());

        match (field, order) {
            (Some(field), Some(order)) => Self {
                page: 1,
                sort_field: field.to_string(),
                sort_order: order,
                ..self.clone()
            },
            _ => Self {
                page: 1,
                sort_field: DEFAULT_SORT_FIELD.to_string(),
                sort_order: SortOrder::default(),
                ..self.clone()
            },
        }
    }

    /// Query parameters in the order the backend documents them.
    pub fn to_params(&self) -> Vec<(String, String)> {
        vec![
            ("page".to_string(), self.page.to_string()),
            ("limit".to_string(), self.page_size.as_u32().to_string()),
            ("sort".to_string(), self.sort_field.clone()),
            ("order".to_string(), self.sort_order.as_str().to_string()),
        ]
    }
}

/// Normalized pagination metadata for one page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaginationDescriptor {
    pub current_page: u64,
    pub per_page: u64,
    pub total: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl PaginationDescriptor {
    /// Descriptor for backends that return every row without pagination metadata.
    pub fn single_page(result_count: usize) -> Self {
        let count = result_count as u64;
        Self {
            current_page: 1,
            per_page: count,
            total: count,
            total_pages: 1,
            has_next: false,
            has_previous: false,
        }
    }

    /// First and last 1-based item positions shown on this page, `(0, 0)` when empty.
    pub fn item_range(&self) -> (u64, u64) {
        if self.total == 0 {
            return (0, 0);
        }

        // Backend-supplied values; saturate rather than overflow.
        let start = self.current_page.saturating_sub(1).saturating_mul(self.per_page).saturating_add(1);
        let end = self.current_page.saturating_mul(self.per_page).min(self.total);
        (start.min(end), end)
    }
}

/// Pagination block as the backend sends it. Navigation fields are derived
/// when a backend version leaves them out.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPagination {
    pub current_page: u64,
    pub per_page: u64,
    pub total: u64,
    pub total_pages: Option<u64>,
    pub has_next: Option<bool>,
    pub has_previous: Option<bool>,
}

impl From<RawPagination> for PaginationDescriptor {
    fn from(raw: RawPagination) -> Self {
        let current_page = raw.current_page.max(1);
        let total_pages = raw.total_pages.unwrap_or_else(|| {
            if raw.per_page > 0 {
                raw.total.div_ceil(raw.per_page).max(1)
            } else {
                1
            }
        });

        Self {
            current_page,
            per_page: raw.per_page,
            total: raw.total,
            total_pages,
            has_next: raw.has_next.unwrap_or(current_page < total_pages),
            has_previous: raw.has_previous.unwrap_or(current_page > 1),
        }
    }
}

impl PaginationDescriptor {
    /// Reconciles an optional backend pagination block with the rows it came with.
    pub fn normalize(raw: Option<RawPagination>, result_count: usize) -> Self {
        match raw {
            Some(raw) => raw.into(),
            None => Self::single_page(result_count),
        }
    }
}
