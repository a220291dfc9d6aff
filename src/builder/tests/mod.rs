use super::test_helpers::*;
use super::*;
use crate::error::StageError;
use crate::events::{ServerEvent, ToggleLink};
use crate::types::{Package, PackageCategory, Status};
use uuid::Uuid;
use wiremock::MockServer;
