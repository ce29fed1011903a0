//! SeaORM entity models
//!
//! Database entities for Papertrail

mod account;
mod assignment;
mod author;
mod conference_slot;
mod contact_message;
mod paper;
mod review;
mod reviewer;

pub use account::{
    Entity as AccountEntity,
    Model as Account,
    ActiveModel as AccountActiveModel,
    Column as AccountColumn,
};

pub use author::{
    Entity as AuthorEntity,
    Model as Author,
    ActiveModel as AuthorActiveModel,
    Column as AuthorColumn,
    Relation as AuthorRelation,
};

pub use paper::{
    Entity as PaperEntity,
    Model as Paper,
    ActiveModel as PaperActiveModel,
    Column as PaperColumn,
    Relation as PaperRelation,
    PaperStatus,
};

pub use reviewer::{
    Entity as ReviewerEntity,
    Model as Reviewer,
    ActiveModel as ReviewerActiveModel,
    Column as ReviewerColumn,
};

pub use assignment::{
    Entity as AssignmentEntity,
    Model as Assignment,
    ActiveModel as AssignmentActiveModel,
    Column as AssignmentColumn,
    Relation as AssignmentRelation,
};

pub use review::{
    Entity as ReviewEntity,
    Model as Review,
    ActiveModel as ReviewActiveModel,
    Column as ReviewColumn,
    Relation as ReviewRelation,
};

pub use conference_slot::{
    Entity as ConferenceSlotEntity,
    Model as ConferenceSlot,
    ActiveModel as ConferenceSlotActiveModel,
    Column as ConferenceSlotColumn,
    Relation as ConferenceSlotRelation,
};

pub use contact_message::{
    Entity as ContactMessageEntity,
    Model as ContactMessage,
    ActiveModel as ContactMessageActiveModel,
    Column as ContactMessageColumn,
};
