//! Page-based listing shared by every collection endpoint.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// `?page=&size=` query parameters.
#[derive(Deserialize, Debug, Clone, Copy)]
pub struct PageParams {
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default = "default_size")]
    pub size: u32,
}

fn first_page() -> u32 {
    1
}

fn default_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: first_page(),
            size: default_size(),
        }
    }
}

impl PageParams {
    pub fn validate(&self) -> Result<(), String> {
        if self.page < 1 {
            return Err("page must be greater than or equal to 1".into());
        }
        if self.size < 1 || self.size > MAX_PAGE_SIZE {
            return Err(format!("size must be between 1 and {MAX_PAGE_SIZE}"));
        }
        Ok(())
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.size)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.size)
    }
}

/// One page of results.
#[derive(Serialize, Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub size: u32,
    pub pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, params: PageParams) -> Self {
        let size = i64::from(params.size.max(1));
        Self {
            items,
            total,
            page: params.page,
            size: params.size,
            pages: (total + size - 1) / size,
        }
    }
}
