//! Client command definitions.
//!
//! Text commands are small JSON objects serialized with serde and sent via
//! `TextMessage`; the only binary message is the packed `put` payload.

/// Declare a command whose JSON is `{"<key>": "<key>"}`.
macro_rules! echo_command {
    ($(#[$meta:meta])* $name:ident => $key:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(
                &self,
                serializer: S,
            ) -> std::result::Result<S::Ok, S::Error> {
                use serde::ser::SerializeMap;
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry($key, $key)?;
                map.end()
            }
        }
    };
}

pub(crate) use echo_command;

pub mod connect;
pub mod fetch;
pub mod put;
pub mod statement;

pub use connect::{CloseConnection, ConnectDatabase, Ping, ReconnectDatabase};
pub use fetch::Fetch;
pub use put::{Put, PutPayload};
pub use statement::{
    CloseStatement, Execute, GetStatementId, PrepareStatement, QueryTypeIn, QueryTypeOut,
    ReconstructStatement,
};
