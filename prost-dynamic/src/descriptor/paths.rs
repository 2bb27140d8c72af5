//! Field numbers from `descriptor.proto`, used to build the source paths that locate problems.

pub(super) const FILE_PACKAGE: i32 = 2;
pub(super) const FILE_DEPENDENCY: i32 = 3;
pub(super) const FILE_MESSAGE_TYPE: i32 = 4;
pub(super) const FILE_ENUM_TYPE: i32 = 5;
pub(super) const FILE_SERVICE: i32 = 6;
pub(super) const FILE_EXTENSION: i32 = 7;
pub(super) const FILE_SYNTAX: i32 = 12;

pub(super) const MESSAGE_NAME: i32 = 1;
pub(super) const MESSAGE_FIELD: i32 = 2;
pub(super) const MESSAGE_NESTED_TYPE: i32 = 3;
pub(super) const MESSAGE_ENUM_TYPE: i32 = 4;
pub(super) const MESSAGE_EXTENSION: i32 = 6;
pub(super) const MESSAGE_ONEOF_DECL: i32 = 8;

pub(super) const FIELD_NAME: i32 = 1;
pub(super) const FIELD_NUMBER: i32 = 3;
pub(super) const FIELD_LABEL: i32 = 4;
pub(super) const FIELD_TYPE: i32 = 5;
pub(super) const FIELD_TYPE_NAME: i32 = 6;
pub(super) const FIELD_ONEOF_INDEX: i32 = 9;
pub(super) const FIELD_JSON_NAME: i32 = 10;

pub(super) const ONEOF_NAME: i32 = 1;

pub(super) const ENUM_NAME: i32 = 1;
pub(super) const ENUM_VALUE: i32 = 2;

pub(super) const ENUM_VALUE_NAME: i32 = 1;
pub(super) const ENUM_VALUE_NUMBER: i32 = 2;
