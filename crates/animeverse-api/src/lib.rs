pub mod anilist;
pub mod backend;
pub mod jikan;
pub mod traits;

#[cfg(test)]
mod test_support;
