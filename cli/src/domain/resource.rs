//! Resources that can publish a TCP port on their server.
//!
//! Each concrete resource type implements the capability traits itself;
//! callers go through [`PublicPortResource`] and [`HasOwningTeam`] rather
//! than matching on concrete types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::server::ServerId;

/// Team identifier.
pub type TeamId = u64;

/// Resolves the team a resource belongs to.
pub trait HasOwningTeam {
    fn owning_team(&self) -> Option<TeamId>;
}

/// A resource whose port may be exposed publicly on its server.
pub trait PublicPortResource {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn server_id(&self) -> Option<ServerId>;
    fn public_port(&self) -> Option<u16>;
    fn is_public(&self) -> bool;
}

/// Database engines that can be exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseEngine {
    Postgres,
    Mysql,
    Mariadb,
    Mongodb,
    Redis,
    Keydb,
    Dragonfly,
    Clickhouse,
}

impl DatabaseEngine {
    /// Port the engine listens on inside its container.
    #[must_use]
    pub fn internal_port(self) -> u16 {
        match self {
            Self::Postgres => 5432,
            Self::Mysql | Self::Mariadb => 3306,
            Self::Mongodb => 27017,
            Self::Redis | Self::Keydb | Self::Dragonfly => 6379,
            Self::Clickhouse => 9000,
        }
    }
}

impl fmt::Display for DatabaseEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
            Self::Mariadb => "mariadb",
            Self::Mongodb => "mongodb",
            Self::Redis => "redis",
            Self::Keydb => "keydb",
            Self::Dragonfly => "dragonfly",
            Self::Clickhouse => "clickhouse",
        })
    }
}

impl FromStr for DatabaseEngine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "mysql" => Ok(Self::Mysql),
            "mariadb" => Ok(Self::Mariadb),
            "mongodb" | "mongo" => Ok(Self::Mongodb),
            "redis" => Ok(Self::Redis),
            "keydb" => Ok(Self::Keydb),
            "dragonfly" => Ok(Self::Dragonfly),
            "clickhouse" => Ok(Self::Clickhouse),
            other => Err(format!("unknown database engine '{other}'")),
        }
    }
}

/// Database deployed on its own, owned directly by a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandaloneDatabase {
    pub id: String,
    pub name: String,
    pub engine: DatabaseEngine,
    pub server_id: Option<ServerId>,
    pub team_id: Option<TeamId>,
    #[serde(default)]
    pub public_port: Option<u16>,
    #[serde(default)]
    pub is_public: bool,
}

/// Parent of a [`ServiceDatabase`]; carries the team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRef {
    pub name: String,
    pub server_id: Option<ServerId>,
    pub team_id: Option<TeamId>,
}

/// Database that is one component of a multi-container service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDatabase {
    pub id: String,
    pub name: String,
    pub engine: DatabaseEngine,
    pub service: ServiceRef,
    #[serde(default)]
    pub public_port: Option<u16>,
    #[serde(default)]
    pub is_public: bool,
}

impl HasOwningTeam for StandaloneDatabase {
    fn owning_team(&self) -> Option<TeamId> {
        self.team_id
    }
}

impl HasOwningTeam for ServiceDatabase {
    fn owning_team(&self) -> Option<TeamId> {
        self.service.team_id
    }
}

impl PublicPortResource for StandaloneDatabase {
    fn id(&self) -> &str {
        &self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn server_id(&self) -> Option<ServerId> {
        self.server_id
    }
    fn public_port(&self) -> Option<u16> {
        self.public_port
    }
    fn is_public(&self) -> bool {
        self.is_public
    }
}

impl PublicPortResource for ServiceDatabase {
    fn id(&self) -> &str {
        &self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn server_id(&self) -> Option<ServerId> {
        self.service.server_id
    }
    fn public_port(&self) -> Option<u16> {
        self.public_port
    }
    fn is_public(&self) -> bool {
        self.is_public
    }
}

/// Any persisted resource type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Resource {
    Database(StandaloneDatabase),
    ServiceDatabase(ServiceDatabase),
}

impl Resource {
    fn inner(&self) -> &dyn PublicPortResource {
        match self {
            Self::Database(db) => db,
            Self::ServiceDatabase(db) => db,
        }
    }

    #[must_use]
    pub fn engine(&self) -> DatabaseEngine {
        match self {
            Self::Database(db) => db.engine,
            Self::ServiceDatabase(db) => db.engine,
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        match self {
            Self::Database(db) => db.name = name,
            Self::ServiceDatabase(db) => db.name = name,
        }
    }

    /// Change port exposure; `None` leaves the respective field as is.
    pub fn set_exposure(&mut self, port: Option<u16>, public: Option<bool>) {
        let (slot, flag) = match self {
            Self::Database(db) => (&mut db.public_port, &mut db.is_public),
            Self::ServiceDatabase(db) => (&mut db.public_port, &mut db.is_public),
        };
        if let Some(port) = port {
            *slot = Some(port);
        }
        if let Some(public) = public {
            *flag = public;
        }
    }
}

impl PublicPortResource for Resource {
    fn id(&self) -> &str {
        self.inner().id()
    }
    fn name(&self) -> &str {
        self.inner().name()
    }
    fn server_id(&self) -> Option<ServerId> {
        self.inner().server_id()
    }
    fn public_port(&self) -> Option<u16> {
        self.inner().public_port()
    }
    fn is_public(&self) -> bool {
        self.inner().is_public()
    }
}

impl HasOwningTeam for Resource {
    fn owning_team(&self) -> Option<TeamId> {
        match self {
            Self::Database(db) => db.owning_team(),
            Self::ServiceDatabase(db) => db.owning_team(),
        }
    }
}

/// True when the public port or the public flag differs from the
/// persisted record. A resource seen for the first time counts as changed.
#[must_use]
pub fn exposure_changed<R: PublicPortResource>(original: Option<&R>, updated: &R) -> bool {
    original.is_none_or(|o| {
        o.public_port() != updated.public_port() || o.is_public() != updated.is_public()
    })
}

/// True when `other` publicly occupies `port` on `server`, excluding `self_id`.
#[must_use]
pub fn occupies<R: PublicPortResource>(other: &R, server: ServerId, port: u16, self_id: &str) -> bool {
    other.id() != self_id
        && other.is_public()
        && other.server_id() == Some(server)
        && other.public_port() == Some(port)
}
