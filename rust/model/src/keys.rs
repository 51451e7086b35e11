// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Handles for objects stored in a [`CityModel`](crate::CityModel).

use slotmap::new_key_type;

new_key_type! {
    /// Stable handle of a city object inside its model.
    pub struct ObjectKey;
}
