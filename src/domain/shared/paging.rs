use serde::{Deserialize, Serialize};

use super::errors::DomainError;

pub const MAX_PAGE_SIZE: u32 = 100;
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Zero-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub number: u32,
    pub size: u32,
}

impl PageRequest {
    pub fn new(number: u32, size: u32) -> Result<Self, DomainError> {
        if size == 0 || size > MAX_PAGE_SIZE {
            return Err(DomainError::invalid(format!(
                "page size must be between 1 and {MAX_PAGE_SIZE}, got {size}"
            )));
        }
        Ok(Self { number, size })
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.number) * u64::from(self.size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            number: 0,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u32,
    pub size: u32,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn new(request: PageRequest, items: Vec<T>, total: u64) -> Self {
        Self {
            items,
            number: request.number,
            size: request.size,
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_from_number_and_size() {
        let page = PageRequest::new(3, 25).unwrap();
        assert_eq!(page.offset(), 75);
        assert_eq!(page.limit(), 25);
    }

    #[test]
    fn test_rejects_out_of_range_sizes() {
        assert!(matches!(PageRequest::new(0, 0), Err(DomainError::InvalidInput { .. })));
        assert!(PageRequest::new(0, MAX_PAGE_SIZE + 1).is_err());
        assert!(PageRequest::new(0, MAX_PAGE_SIZE).is_ok());
    }
}
