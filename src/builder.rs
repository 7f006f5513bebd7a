//! Builder for configuring and constructing a `PropertyExchangeEndpoint`.

use midi_ci_core::Muid;
use midi_ci_property::{BufferOutput, PropertyExchangeConfig};
use tracing::info;

use crate::endpoint::{PropertyDelegate, PropertyExchangeEndpoint};
use crate::Result;

/// The MUID is random unless one is given. All messages go out on the configured
/// group.
///
/// # Example
///
/// ```ignore
/// use midi_ci::prelude::*;
///
/// let (output, transport_rx) = ChannelOutput::unbounded();
/// let mut endpoint = PropertyExchangeEndpoint::builder()
///     .group(0)
///     .max_sysex_size(256)
///     .build(output, delegate)?;
///
/// endpoint.send_get_data(remote, &PropertyRequestHeader::new("DeviceInfo"), |result| {
///     println!("{:?}", result.header());
/// })?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct PropertyExchangeEndpointBuilder {
    muid: Option<Muid>,
    group: u8,
    config: PropertyExchangeConfig,
}

impl PropertyExchangeEndpointBuilder {
    pub fn muid(mut self, muid: Muid) -> Self {
        self.muid = Some(muid);
        self
    }

    /// Default: 0
    pub fn group(mut self, group: u8) -> Self {
        self.group = group & 0x0f;
        self
    }

    pub fn config(mut self, config: PropertyExchangeConfig) -> Self {
        self.config = config;
        self
    }

    /// Default: 512
    pub fn max_sysex_size(mut self, size: usize) -> Self {
        self.config = self.config.with_max_sysex_size(size);
        self
    }

    /// Default: 1
    pub fn max_simultaneous_requests(mut self, count: u8) -> Self {
        self.config = self.config.with_max_simultaneous_requests(count);
        self
    }

    pub fn build<O: BufferOutput, D: PropertyDelegate>(
        self,
        output: O,
        delegate: D,
    ) -> Result<PropertyExchangeEndpoint<O, D>> {
        self.config.validate()?;

        let muid = self
            .muid
            .unwrap_or_else(|| Muid::random(&mut rand::thread_rng()));

        info!(
            "Property exchange endpoint {} on group {} (max sysex {} bytes, {} simultaneous requests)",
            muid, self.group, self.config.max_sysex_size, self.config.max_simultaneous_requests
        );

        Ok(PropertyExchangeEndpoint::new(
            muid,
            self.group,
            self.config,
            output,
            delegate,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::PropertyReplyData;
    use midi_ci_core::{PropertyReplyHeader, PropertyRequestHeader};
    use midi_ci_property::OutgoingMessage;

    struct Silent;

    impl PropertyDelegate for Silent {
        fn property_get_data(&mut self, _: Muid, _: &PropertyRequestHeader) -> PropertyReplyData {
            PropertyReplyData::default()
        }

        fn property_set_data(
            &mut self,
            _: Muid,
            _: &PropertyRequestHeader,
            _: &[u8],
        ) -> PropertyReplyHeader {
            PropertyReplyHeader::default()
        }
    }

    #[test]
    fn test_builder_defaults() {
        let endpoint = PropertyExchangeEndpoint::builder()
            .build(Vec::<OutgoingMessage>::new(), Silent)
            .unwrap();
        assert_eq!(endpoint.config(), &PropertyExchangeConfig::default());
        assert!(endpoint.muid().as_u32() < 0x0fff_ff00);
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let result = PropertyExchangeEndpoint::builder()
            .max_sysex_size(16)
            .build(Vec::<OutgoingMessage>::new(), Silent);
        assert!(matches!(
            result,
            Err(crate::Error::Property(midi_ci_property::Error::InvalidConfig(_)))
        ));
    }
}
