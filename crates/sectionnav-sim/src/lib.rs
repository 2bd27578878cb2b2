pub mod page;
pub mod scenario;
pub mod scroll;

pub use page::SimPage;
pub use scenario::{run_scenario, Failure, Scenario, ScenarioReport};
