pub mod alert_models;
