//! Protobuf messages of the `auth.TemporalAuth` service.

use crate::store;

#[derive(Clone, PartialEq, prost::Message)]
pub struct Empty {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Credentials {
    #[prost(string, tag = "1")]
    pub username: String,
    #[prost(string, tag = "2")]
    pub password: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RegisterReq {
    #[prost(string, tag = "1")]
    pub email_address: String,
    #[prost(message, optional, tag = "2")]
    pub credentials: Option<Credentials>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum RecoverType {
    Password = 0,
    Username = 1,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RecoverReq {
    #[prost(enumeration = "RecoverType", tag = "1")]
    pub r#type: i32,
    #[prost(string, tag = "2")]
    pub email_address: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Token {
    #[prost(int64, tag = "1")]
    pub expire: i64,
    #[prost(string, tag = "2")]
    pub token: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PasswordChange {
    #[prost(string, tag = "1")]
    pub old_password: String,
    #[prost(string, tag = "2")]
    pub new_password: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct UpdateReq {
    #[prost(oneof = "update_req::Update", tags = "1, 2")]
    pub update: Option<update_req::Update>,
}

pub mod update_req {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Update {
        #[prost(message, tag = "1")]
        PasswordChange(super::PasswordChange),
        #[prost(message, tag = "2")]
        DataTierChange(super::Empty),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum Tier {
    Free = 0,
    Light = 1,
    Plus = 2,
    Partner = 3,
}

impl From<store::Tier> for Tier {
    fn from(tier: store::Tier) -> Self {
        match tier {
            store::Tier::Free => Self::Free,
            store::Tier::Light => Self::Light,
            store::Tier::Plus => Self::Plus,
            store::Tier::Partner => Self::Partner,
        }
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct User {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(string, tag = "2")]
    pub user_name: String,
    #[prost(string, tag = "3")]
    pub email_address: String,
    #[prost(bool, tag = "4")]
    pub verified: bool,
    #[prost(double, tag = "5")]
    pub credits: f64,
    #[prost(message, optional, tag = "6")]
    pub usage: Option<user::Usage>,
    #[prost(bool, tag = "7")]
    pub api_access: bool,
    #[prost(bool, tag = "8")]
    pub admin_access: bool,
}

pub mod user {
    use crate::store;

    #[derive(Clone, Copy, PartialEq, prost::Message)]
    pub struct Limits {
        #[prost(int64, tag = "1")]
        pub limit: i64,
        #[prost(int64, tag = "2")]
        pub used: i64,
    }

    impl From<store::Limits> for Limits {
        fn from(limits: store::Limits) -> Self {
            Self {
                limit: limits.limit,
                used: limits.used,
            }
        }
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Usage {
        #[prost(enumeration = "super::Tier", tag = "1")]
        pub tier: i32,
        #[prost(message, optional, tag = "2")]
        pub data: Option<Limits>,
        #[prost(message, optional, tag = "3")]
        pub ipns_records: Option<Limits>,
        #[prost(message, optional, tag = "4")]
        pub pubsub_sent: Option<Limits>,
        #[prost(message, optional, tag = "5")]
        pub keys: Option<Limits>,
    }

    impl From<&store::Usage> for Usage {
        fn from(usage: &store::Usage) -> Self {
            Self {
                tier: super::Tier::from(usage.tier) as i32,
                data: Some(usage.data_bytes.into()),
                ipns_records: Some(usage.ipns_records.into()),
                pubsub_sent: Some(usage.pubsub_sent.into()),
                keys: Some(usage.keys.into()),
            }
        }
    }
}

impl From<crate::account::UserView> for User {
    fn from(view: crate::account::UserView) -> Self {
        Self {
            id: view.user.id,
            user_name: view.user.username,
            email_address: view.user.email,
            verified: view.user.account_enabled,
            credits: view.user.credits,
            usage: view.usage.as_ref().map(user::Usage::from),
            api_access: view.api_access,
            admin_access: view.user.admin_access,
        }
    }
}

impl From<crate::token::SessionToken> for Token {
    fn from(token: crate::token::SessionToken) -> Self {
        Self {
            expire: token.expire,
            token: token.token,
        }
    }
}
