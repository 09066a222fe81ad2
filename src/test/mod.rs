// SPDX-License-Identifier: Apache-2.0
mod sensor_mock;

pub(crate) use sensor_mock::*;
