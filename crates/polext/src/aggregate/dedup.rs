use std::collections::HashSet;

/// Key under which two offers are considered the same insurer.
pub fn company_key(company: &str) -> String {
    company.trim().to_lowercase()
}

/// Keeps the first item per company and drops items without a company.
///
/// Order of the surviving items is the order of first appearance.
pub fn dedup_by_company<T, F>(items: impl IntoIterator<Item = T>, company: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| {
            let key = company_key(company(item));
            !key.is_empty() && seen.insert(key)
        })
        .collect()
}
