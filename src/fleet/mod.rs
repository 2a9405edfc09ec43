//! Peer-set view: which users live on this node, and which of their
//! replicas are reachable.

mod view;

pub use view::PeerSetView;
