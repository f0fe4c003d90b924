use crate::FeedItem;

/// Whether an item passes a recipient's distributor filter.
///
/// A filter entry matches when it equals a parsed distributor or appears in
/// the raw distributor text, ignoring case. Items without detail data only
/// pass an empty filter.
pub fn matches_distributeurs(item: &FeedItem, filters: &[String]) -> bool {
    let filters: Vec<String> = filters
        .iter()
        .map(|f| f.trim().to_lowercase())
        .filter(|f| !f.is_empty())
        .collect();
    if filters.is_empty() {
        return true;
    }
    let Some(info) = item.distributor.as_ref() else {
        return false;
    };

    let listed: Vec<String> = info
        .distributeurs_list
        .iter()
        .map(|d| d.trim().to_lowercase())
        .collect();
    let raw = info.distributeurs_raw.to_lowercase();
    filters
        .iter()
        .any(|f| listed.iter().any(|d| d == f) || raw.contains(f.as_str()))
}

pub fn filter_by_distributeurs(items: &[FeedItem], filters: &[String]) -> Vec<FeedItem> {
    items
        .iter()
        .filter(|item| matches_distributeurs(item, filters))
        .cloned()
        .collect()
}
