//! The Member/Team domain model.
//!
//! `Member` holds an optional reference to a `Team`; `Team.members` is the
//! query-time inverse of that reference, never a stored collection.

use ormq_proto::{EntityRow, SelectItem, Value};
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, EntityDef, FieldDef, RelationDef, ScalarType};
use crate::error::{Error, Result};
use crate::path::{EntityPath, EntitySource, NumberPath, RelationPath, StringPath};

/// A typed entity stored as an [`EntityRow`].
pub trait Entity: Sized {
    /// Entity name in the catalog.
    const NAME: &'static str;

    /// Convert to an untyped row.
    fn to_row(&self) -> EntityRow;

    /// Convert from an untyped row.
    fn from_row(row: &EntityRow) -> Result<Self>;
}

/// A team member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: i64,
    pub username: Option<String>,
    pub age: i32,
    /// Identity of the owning team.
    pub team: Option<i64>,
}

impl Member {
    /// Create a member with a username.
    pub fn new(id: i64, username: impl Into<String>, age: i32, team: Option<i64>) -> Self {
        Self {
            id,
            username: Some(username.into()),
            age,
            team,
        }
    }

    /// Create a member without a username.
    pub fn anonymous(id: i64, age: i32, team: Option<i64>) -> Self {
        Self {
            id,
            username: None,
            age,
            team,
        }
    }
}

/// A team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub name: String,
}

impl Team {
    /// Create a team.
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

fn field<'a>(row: &'a EntityRow, entity: &str, name: &str) -> Result<&'a Value> {
    row.get(name).ok_or_else(|| {
        Error::Dataset(format!("{} row {} is missing '{}'", entity, row.id, name))
    })
}

fn mistyped(entity: &str, name: &str, value: &Value) -> Error {
    Error::Dataset(format!(
        "{}.{} cannot be read from {} ({})",
        entity,
        name,
        value,
        value.type_name()
    ))
}

impl Entity for Member {
    const NAME: &'static str = "Member";

    fn to_row(&self) -> EntityRow {
        EntityRow::new(self.id)
            .with_field("username", self.username.clone())
            .with_field("age", self.age)
            .with_field("team", self.team)
    }

    fn from_row(row: &EntityRow) -> Result<Self> {
        let username = match field(row, Self::NAME, "username")? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => return Err(mistyped(Self::NAME, "username", other)),
        };
        let age = match field(row, Self::NAME, "age")? {
            Value::Int32(i) => *i,
            other => return Err(mistyped(Self::NAME, "age", other)),
        };
        let team = match field(row, Self::NAME, "team")? {
            Value::Null => None,
            Value::Int64(i) => Some(*i),
            other => return Err(mistyped(Self::NAME, "team", other)),
        };
        Ok(Self {
            id: row.id,
            username,
            age,
            team,
        })
    }
}

impl Entity for Team {
    const NAME: &'static str = "Team";

    fn to_row(&self) -> EntityRow {
        EntityRow::new(self.id).with_field("name", self.name.as_str())
    }

    fn from_row(row: &EntityRow) -> Result<Self> {
        let name = match field(row, Self::NAME, "name")? {
            Value::String(s) => s.clone(),
            other => return Err(mistyped(Self::NAME, "name", other)),
        };
        Ok(Self { id: row.id, name })
    }
}

/// Build the Member/Team catalog.
pub fn catalog() -> Catalog {
    let team = EntityDef::new(Team::NAME, "id")
        .with_field(FieldDef::scalar("id", ScalarType::Int64))
        .with_field(FieldDef::scalar("name", ScalarType::String));

    let member = EntityDef::new(Member::NAME, "id").with_fields([
        FieldDef::scalar("id", ScalarType::Int64),
        FieldDef::optional_scalar("username", ScalarType::String),
        FieldDef::scalar("age", ScalarType::Int32),
        FieldDef::optional_scalar("team", ScalarType::Int64),
    ]);

    let member_team = RelationDef::many_to_one("team", Member::NAME, "team", Team::NAME, "id");

    Catalog::new()
        .with_entity(team)
        .with_entity(member)
        .with_relation(member_team.inverse("members"))
        .with_relation(member_team)
}

/// Typed field registry for `Member`.
#[derive(Debug, Clone)]
pub struct QMember {
    path: EntityPath<Member>,
    pub id: NumberPath<i64>,
    pub username: StringPath,
    pub age: NumberPath<i32>,
    pub team: RelationPath,
}

impl QMember {
    /// Registry bound to `alias`.
    pub fn new(alias: &str) -> Self {
        Self {
            path: EntityPath::new(Member::NAME, alias),
            id: NumberPath::new(alias, "id"),
            username: StringPath::new(alias, "username"),
            age: NumberPath::new(alias, "age"),
            team: RelationPath::new(alias, "team", Team::NAME),
        }
    }

    /// Registry bound to the default alias `member`.
    pub fn member() -> Self {
        Self::new("member")
    }

    /// Row count (`count(*)`).
    pub fn count(&self) -> ormq_proto::Expr {
        self.path.count()
    }
}

impl EntitySource for QMember {
    type Entity = Member;

    fn entity_path(&self) -> &EntityPath<Member> {
        &self.path
    }
}

impl From<&QMember> for SelectItem {
    fn from(q: &QMember) -> Self {
        SelectItem::from(&q.path)
    }
}

/// Typed field registry for `Team`.
#[derive(Debug, Clone)]
pub struct QTeam {
    path: EntityPath<Team>,
    pub id: NumberPath<i64>,
    pub name: StringPath,
    pub members: RelationPath,
}

impl QTeam {
    /// Registry bound to `alias`.
    pub fn new(alias: &str) -> Self {
        Self {
            path: EntityPath::new(Team::NAME, alias),
            id: NumberPath::new(alias, "id"),
            name: StringPath::new(alias, "name"),
            members: RelationPath::new(alias, "members", Member::NAME),
        }
    }

    /// Registry bound to the default alias `team`.
    pub fn team() -> Self {
        Self::new("team")
    }

    /// Row count (`count(*)`).
    pub fn count(&self) -> ormq_proto::Expr {
        self.path.count()
    }
}

impl EntitySource for QTeam {
    type Entity = Team;

    fn entity_path(&self) -> &EntityPath<Team> {
        &self.path
    }
}

impl From<&QTeam> for SelectItem {
    fn from(q: &QTeam) -> Self {
        SelectItem::from(&q.path)
    }
}
