use super::*;

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            min_price_per_litre: 1.40,
            max_price_per_litre: 1.60,
            increment_rate: 0.0015,
            currency_symbol: "£".to_string(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            trigger_interval_ms: 3,
            card_interval_ms: 500,
            card_cooldown_ms: 2000,
            card_read_timeout_ms: 250,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            payment_success_ms: 3000,
            cancel_grace_ms: 100,
            key_release_timeout_ms: 150,
        }
    }
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            button_pin: 17,
            active_low: true,
        }
    }
}

impl Default for RfidConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            spi_bus: 0,
            chip_select: 0,
            clock_hz: 1_000_000,
            init_timeout_ms: 2000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            console_level: None,
            file_level: None,
            web_level: None,
            file: "/tmp/forecourt/forecourt.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            static_dir: "./webui".to_string(),
        }
    }
}
