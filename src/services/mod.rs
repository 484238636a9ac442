pub mod classifier_service;
pub mod component_service;
pub mod damage_record_service;
pub mod dashboard_service;
pub mod model_metrics_service;
pub mod prediction_service;
