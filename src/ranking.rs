//! Page popularity ranking

use crate::types::{PageCount, PageViewEvent};
use std::collections::HashMap;

/// Count views per page, in the order each page is first encountered
pub fn tally(events: &[PageViewEvent]) -> Vec<PageCount> {
    let mut counts: Vec<PageCount> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for event in events {
        match index.get(event.page_name.as_str()) {
            Some(&slot) => counts[slot].count += 1,
            None => {
                index.insert(&event.page_name, counts.len());
                counts.push(PageCount {
                    page_name: event.page_name.clone(),
                    count: 1,
                });
            }
        }
    }

    counts
}

/// Most viewed pages, descending by count, truncated to `top_n`.
///
/// Ties keep first-encountered order.
pub fn rank(events: &[PageViewEvent], top_n: usize) -> Vec<PageCount> {
    let mut ranked = tally(events);
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(top_n);
    ranked
}
