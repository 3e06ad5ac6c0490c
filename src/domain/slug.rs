//! Slug derivation for human titles.
//!
//! ASCII text goes straight through the `slug` crate; CJK characters are
//! transliterated with `pinyin` first so “技术博客” becomes `ji-shu-bo-ke`.

use std::future::Future;

use pinyin::ToPinyin;
use slug::slugify;
use thiserror::Error;

/// Suffixes tried after the bare base (`-2` through `-33`).
const MAX_SUFFIX_ATTEMPTS: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("`{input}` does not produce a usable slug")]
    Unrepresentable { input: String },
    #[error("no free slug left for `{base}`")]
    Exhausted { base: String },
}

#[derive(Debug, Error)]
pub enum UniqueSlugError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error("slug availability check failed: {0}")]
    Lookup(#[source] E),
}

/// Derive the base slug for a title.
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let candidate = slugify(transliterate(input));
    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    Ok(candidate)
}

/// Candidates in the order they are tried: `base`, `base-2`, `base-3`, ...
pub fn candidates(base: &str) -> impl Iterator<Item = String> + '_ {
    std::iter::once(base.to_string()).chain(
        (2..=MAX_SUFFIX_ATTEMPTS + 1).map(move |attempt| format!("{base}-{attempt}")),
    )
}

/// Find the first candidate for `input` that `is_free` accepts.
///
/// `is_free` usually asks the record store whether a live row already owns
/// the slug.
pub async fn unique_slug<F, Fut, E>(input: &str, mut is_free: F) -> Result<String, UniqueSlugError<E>>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let base = derive_slug(input)?;

    for candidate in candidates(&base) {
        if is_free(candidate.clone())
            .await
            .map_err(UniqueSlugError::Lookup)?
        {
            return Ok(candidate);
        }
    }

    Err(SlugError::Exhausted { base }.into())
}

fn transliterate(input: &str) -> String {
    let mut output = String::with_capacity(input.len());

    for ch in input.chars() {
        if ch.is_ascii() {
            output.push(ch);
            continue;
        }

        match ch.to_pinyin() {
            Some(py) => {
                if !output.is_empty() && !output.ends_with(' ') {
                    output.push(' ');
                }
                output.push_str(py.plain());
                output.push(' ');
            }
            None if ch.is_whitespace() => output.push(' '),
            // slugify decides what survives.
            None => output.push(ch),
        }
    }

    output
}
