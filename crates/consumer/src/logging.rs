use crate::config::ConsumerConfig;

pub fn setup_logging(config: &ConsumerConfig) {
    common::setup_logging(
        common::logging::default_level(config.verbose),
        config.environment.clone(),
    );
}
