//! Helpers to describe the internals of a search in reports.

/// Returns a shorter version of [`std::any::type_name`], keeping only the
/// last segment of each path.
///
/// ```
/// use hsearch::debug::type_name;
/// assert_eq!(type_name::<Vec<Option<u32>>>(), "Vec<Option<u32>>");
/// ```
pub fn type_name<T: ?Sized>() -> String {
    short_type_name(std::any::type_name::<T>())
}

/// Size of `T` in bytes, as reported.
pub fn type_size<T>() -> usize {
    std::mem::size_of::<T>()
}

fn short_type_name(name: &str) -> String {
    let mut short = String::with_capacity(name.len());
    let mut start = 0;
    for (i, c) in name.char_indices() {
        if matches!(
            c,
            '&' | '<' | '>' | '(' | ')' | '[' | ']' | ',' | ';' | ' '
        ) {
            short.push_str(last_segment(&name[start..i]));
            short.push(c);
            start = i + c.len_utf8();
        }
    }
    short.push_str(last_segment(&name[start..]));
    short
}

fn last_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortens_nested_paths() {
        assert_eq!(
            short_type_name("hsearch::algorithms::Search<hsearch::problems::tiles::Tiles, (u8, &alloc::string::String)>"),
            "Search<Tiles, (u8, &String)>"
        );
        assert_eq!(short_type_name("u32"), "u32");
    }
}
