use std::collections::BTreeMap;

use hdfs_events::{Offer, Resources};
use hdfs_id::OfferId;

/// Builder for [`Offer`].
pub struct OfferBuilder {
    offer: Offer,
}

/// Starts an offer with the given id on host `host`, 4 cpus and 8 GB.
pub fn offer(id: &str, host: &str) -> OfferBuilder {
    OfferBuilder::new(id, host)
}

impl OfferBuilder {
    pub fn new(id: &str, host: &str) -> Self {
        Self {
            offer: Offer {
                id: OfferId::parse(id).expect("offer id must not be empty"),
                host: host.to_string(),
                resources: Resources {
                    cpus: 4.0,
                    mem: 8192,
                },
                attributes: BTreeMap::new(),
            },
        }
    }

    pub fn cpus(mut self, cpus: f64) -> Self {
        self.offer.resources.cpus = cpus;
        self
    }

    pub fn mem(mut self, mem: u64) -> Self {
        self.offer.resources.mem = mem;
        self
    }

    pub fn attribute(mut self, name: &str, value: &str) -> Self {
        self.offer
            .attributes
            .insert(name.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> Offer {
        self.offer
    }
}
