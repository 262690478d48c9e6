use serde::{Deserialize, Serialize};

/// Clock resolution assumed when none is given: one tick per millisecond.
pub const DEFAULT_TICKS_PER_SECOND: u64 = 1000;

/// TSCH tuning knobs. Durations are in clock ticks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TschConfig {
    pub ticks_per_second: u64,
    /// Initial keep-alive timeout, sized for a 40 ppm drift budget.
    pub ka_timeout: u64,
    pub max_ka_timeout: u64,
    /// Time without synchronization after which the node leaves the network.
    pub desync_threshold: u64,
    pub eb_period: u64,
    pub max_eb_period: u64,
    /// EBs advertising a higher join priority are ignored.
    pub max_join_priority: u8,
    pub join_secured_only: bool,
    pub join_my_panid_only: bool,
    /// Radio polls per second while scanning.
    pub association_poll_frequency: u32,
    /// Largest accepted difference between the uptime implied by an EB's
    /// ASN and the local uptime. Zero disables the check.
    pub check_time_at_association: u64,
    pub init_schedule_from_eb: bool,
    pub autoselect_time_source: bool,
    pub adaptive_timesync: bool,
    /// Never send EBs.
    pub listen_only: bool,
    /// Frames buffered per neighbor.
    pub queue_capacity: usize,
    pub hopping_sequence: Vec<u8>,
    pub slotframe_length: u16,
    pub timeslot_length: u64,
}

impl TschConfig {
    /// Defaults scaled to a clock running at `ticks_per_second`.
    pub fn with_ticks_per_second(ticks_per_second: u64) -> Self {
        let tres = ticks_per_second.max(1);
        let max_ka_timeout = 60 * tres;
        Self {
            ticks_per_second: tres,
            ka_timeout: 12 * tres,
            max_ka_timeout,
            desync_threshold: 2 * max_ka_timeout,
            eb_period: 16 * tres,
            max_eb_period: 50 * tres,
            max_join_priority: 32,
            join_secured_only: false,
            join_my_panid_only: false,
            association_poll_frequency: 100,
            check_time_at_association: 0,
            init_schedule_from_eb: true,
            autoselect_time_source: false,
            adaptive_timesync: true,
            listen_only: false,
            queue_capacity: 8,
            hopping_sequence: vec![15, 20, 25, 26],
            slotframe_length: 7,
            timeslot_length: (tres / 100).max(1),
        }
    }

    /// Ticks between radio polls while scanning.
    pub fn association_poll_interval(&self) -> u64 {
        let frequency = u64::from(self.association_poll_frequency.max(1));
        (self.ticks_per_second / frequency).max(1)
    }

    pub fn set_ka_timeout(&mut self, ticks: u64) {
        self.ka_timeout = ticks;
    }

    pub fn set_max_ka_timeout(&mut self, ticks: u64) {
        self.max_ka_timeout = ticks;
    }

    pub fn set_desync_threshold(&mut self, ticks: u64) {
        self.desync_threshold = ticks;
    }

    pub fn set_eb_period(&mut self, ticks: u64) {
        self.eb_period = ticks;
    }

    pub fn set_max_eb_period(&mut self, ticks: u64) {
        self.max_eb_period = ticks;
    }

    pub fn set_max_join_priority(&mut self, priority: u8) {
        self.max_join_priority = priority;
    }

    pub fn set_join_secured_only(&mut self, secured_only: bool) {
        self.join_secured_only = secured_only;
    }

    pub fn set_join_my_panid_only(&mut self, my_panid_only: bool) {
        self.join_my_panid_only = my_panid_only;
    }

    pub fn set_check_time_at_association(&mut self, tolerance: u64) {
        self.check_time_at_association = tolerance;
    }

    pub fn set_autoselect_time_source(&mut self, enable: bool) {
        self.autoselect_time_source = enable;
    }

    pub fn set_adaptive_timesync(&mut self, enable: bool) {
        self.adaptive_timesync = enable;
    }

    pub fn set_listen_only(&mut self, listen_only: bool) {
        self.listen_only = listen_only;
    }
}

impl Default for TschConfig {
    fn default() -> Self {
        Self::with_ticks_per_second(DEFAULT_TICKS_PER_SECOND)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_defaults_scale_with_clock_resolution() {
        let config = TschConfig::with_ticks_per_second(32_768);
        assert_eq!(config.ka_timeout, 12 * 32_768);
        assert_eq!(config.max_ka_timeout, 60 * 32_768);
        assert_eq!(config.desync_threshold, 2 * config.max_ka_timeout);
        assert_eq!(config.eb_period, 16 * 32_768);
        assert_eq!(config.max_eb_period, 50 * 32_768);
        assert_eq!(config.association_poll_interval(), 327);
    }

    #[test]
    fn default_join_policy_is_permissive() {
        let config = TschConfig::default();
        assert_eq!(config.max_join_priority, 32);
        assert!(!config.join_secured_only);
        assert!(!config.join_my_panid_only);
        assert_eq!(config.check_time_at_association, 0);
        assert!(config.init_schedule_from_eb);
        assert_eq!(config.association_poll_interval(), 10);
    }

    #[test]
    fn partial_toml_keeps_remaining_defaults() {
        let config: TschConfig = toml::from_str(
            r#"
            max_join_priority = 8
            join_secured_only = true
            hopping_sequence = [11, 26]
            "#,
        )
        .expect("valid toml");
        assert_eq!(config.max_join_priority, 8);
        assert!(config.join_secured_only);
        assert_eq!(config.hopping_sequence, vec![11, 26]);
        assert_eq!(config.ka_timeout, TschConfig::default().ka_timeout);
    }
}
