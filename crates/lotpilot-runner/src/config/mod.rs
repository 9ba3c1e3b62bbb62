pub mod params;
pub mod schema;
pub mod tasks;

pub use params::{ParamDef, Params};
pub use schema::{BrowserConfig, ClassifierConfig, Config, OnFailure, StartUrl, Viewport};
pub use tasks::{Expect, Task, TargetSpec};
