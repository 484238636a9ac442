pub mod component_handlers;
pub mod damage_record_handlers;
pub mod dashboard_handlers;
pub mod docs_handlers;
pub mod extract;
pub mod health_handlers;
pub mod prediction_handlers;
