pub mod browser;
pub mod traits;
pub mod types;
pub mod zonaprop;

pub use browser::ChromeRenderEngine;
pub use traits::{FieldExtractor, RenderEngine};
pub use zonaprop::{ListingLayout, ZonapropExtractor};
