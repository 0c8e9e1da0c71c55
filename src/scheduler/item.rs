//! Hydration items
//!
//! Anything that can name the key its photo is looked up by.

use std::borrow::Cow;

// == Hydration Item ==
/// An item whose photo is hydrated by key (usually its slug).
pub trait HydrationItem {
    fn hydration_key(&self) -> Cow<'_, str>;
}

impl HydrationItem for str {
    fn hydration_key(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl HydrationItem for String {
    fn hydration_key(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_str())
    }
}

impl<T: HydrationItem + ?Sized> HydrationItem for &T {
    fn hydration_key(&self) -> Cow<'_, str> {
        (**self).hydration_key()
    }
}

/// Collects the distinct, non-blank keys of `items`, keeping first-seen order.
pub(crate) fn collect_keys<I>(items: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: HydrationItem,
{
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter_map(|item| {
            let key = item.hydration_key().trim().to_string();
            (!key.is_empty() && seen.insert(key.clone())).then_some(key)
        })
        .collect()
}
