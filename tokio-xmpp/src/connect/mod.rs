//! `ServerConnector` provides streams for XMPP clients

use sasl::common::ChannelBinding;
use tokio::io::{AsyncRead, AsyncWrite};
use xmpp_parsers::jid::Jid;

use crate::xmlstream::{PendingFeaturesRecv, Timeouts};
use crate::Error;

mod dns;
#[cfg(feature = "starttls")]
pub mod starttls;
#[cfg(feature = "insecure-tcp")]
pub mod tcp;

pub use dns::DnsConfig;

/// trait returned wrapped in an [`XmlStream`][`crate::xmlstream::XmlStream`]
/// by a `ServerConnector`
pub trait AsyncReadAndWrite: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncReadAndWrite for T {}

/// Trait that must be extended by the implementation of ServerConnector
pub trait ServerConnectorError: std::error::Error + Sync + Send {}

/// Trait called to connect to an XMPP server, perhaps called multiple times
pub trait ServerConnector: Clone + core::fmt::Debug + Send + Unpin + 'static {
    /// The type of Stream this ServerConnector produces
    type Stream: AsyncReadAndWrite;

    /// Whether the transport this connector produces counts as a secure
    /// channel for SASL purposes.
    ///
    /// `PLAIN` is only offered to the server when this is `true`. Transports
    /// which do not encrypt the connection (e.g. plaintext TCP) must
    /// override this to `false`.
    const TRANSPORT_SECURE: bool = true;

    /// This must return the connection ready to login, ie if starttls is
    /// involved, after TLS has been started, and after the `<stream:stream>`
    /// headers have been exchanged. Stream features have not been consumed
    /// yet; the caller is expected to call
    /// [`PendingFeaturesRecv::recv_features`] next.
    fn connect(
        &self,
        jid: &Jid,
        ns: &'static str,
        timeouts: Timeouts,
    ) -> impl std::future::Future<Output = Result<PendingFeaturesRecv<Self::Stream>, Error>> + Send;

    /// Return channel binding data if available
    /// do not fail if channel binding is simply unavailable, just return Ok(None)
    /// this should only be called after the TLS handshake is finished
    fn channel_binding(_stream: &Self::Stream) -> Result<ChannelBinding, Error> {
        Ok(ChannelBinding::None)
    }
}
