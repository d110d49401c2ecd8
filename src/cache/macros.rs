/// Wraps a fetch in a cache lookup.
///
/// Returns the cached value when present. Otherwise awaits `$block`, hands
/// the result to the cache writer in the background, and returns it.
///
/// # Arguments
/// * `$cache`: anything with `get_from_cache` and `set_in_background`.
/// * `$key`: the `CacheKey`; its category decides the TTL.
/// * `$block`: future producing `AppResult<T>` on a miss.
///
/// # Example
/// ```rust,ignore
/// let titles: Vec<Title> = cached!(self.cache, key, async move {
///     self.fetch_page(&url).await
/// })?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $block:expr) => {{
        let key = $key;
        if let Some(cached) = $cache.get_from_cache(&key).await? {
            Ok(cached)
        } else {
            let value = $block.await?;
            $cache.set_in_background(&key, &value);
            Ok(value)
        }
    }};
}
