pub mod attributes;
pub mod boot;
pub mod fixup;
pub mod record;
pub mod runs;
