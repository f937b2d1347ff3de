use crate::model::NetworkIo;
use std::collections::HashMap;
use sysinfo::Networks;

pub struct NetworkCollector {
    networks: Networks,
    previous_stats: HashMap<String, (u64, u64, u64, u64)>, // (rx_bytes, tx_bytes, rx_packets, tx_packets)
}

impl NetworkCollector {
    pub fn new() -> Self {
        let networks = Networks::new_with_refreshed_list();

        Self {
            networks,
            previous_stats: HashMap::new(),
        }
    }

    /// Traffic since the previous call, summed over non-loopback interfaces.
    ///
    /// An interface seen for the first time contributes zero, so the first
    /// call after construction reports no traffic. A counter that went
    /// backwards (interface reset) also contributes zero.
    pub fn collect(&mut self) -> NetworkIo {
        self.networks.refresh_list();
        self.networks.refresh();

        let mut io = NetworkIo::default();
        let mut current = HashMap::with_capacity(self.previous_stats.len());

        for (interface_name, data) in &self.networks {
            let stats = (
                data.total_received(),
                data.total_transmitted(),
                data.total_packets_received(),
                data.total_packets_transmitted(),
            );

            if let Some((prev_rx, prev_tx, prev_rx_packets, prev_tx_packets)) =
                self.previous_stats.get(interface_name.as_str())
            {
                if !is_loopback(interface_name) {
                    io.bytes_recv += stats.0.saturating_sub(*prev_rx);
                    io.bytes_sent += stats.1.saturating_sub(*prev_tx);
                    io.packets_recv += stats.2.saturating_sub(*prev_rx_packets);
                    io.packets_sent += stats.3.saturating_sub(*prev_tx_packets);
                }
            }

            current.insert(interface_name.clone(), stats);
        }

        // Interfaces that disappeared are forgotten
        self.previous_stats = current;
        io
    }
}

/// `lo` on Linux, `lo0` and friends on BSD-derived systems
fn is_loopback(interface_name: &str) -> bool {
    interface_name
        .strip_prefix("lo")
        .is_some_and(|rest| rest.bytes().all(|b| b.is_ascii_digit()))
}
