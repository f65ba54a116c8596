//! Queue roles and queue family assignment
//!
//! The device uses three queues, one per [`QueueRole`]. A single pass over the
//! physical device's queue families builds the role → family table: for every
//! role the *last* family advertising the matching capability wins, so a
//! family that can do everything ends up serving several roles and the
//! device asks for as few distinct families as possible.
//!
//! Roles sharing a family get consecutive queue slots within it. The
//! assignment fails before any device is created if a family would need more
//! queues than it has.

use std::fmt;

use ash::vk;
use bitflags::bitflags;

use super::{VulkanError, VulkanResult};

/// Work a queue is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueRole {
    /// Rendering and presentation
    Graphics,
    /// Compute dispatch
    Compute,
    /// Buffer and image transfers
    Transfer,
}

impl QueueRole {
    /// Every role in assignment order
    pub const ALL: [Self; 3] = [Self::Graphics, Self::Compute, Self::Transfer];

    /// Queue capability a family needs to serve this role
    pub fn queue_flag(self) -> vk::QueueFlags {
        match self {
            Self::Graphics => vk::QueueFlags::GRAPHICS,
            Self::Compute => vk::QueueFlags::COMPUTE,
            Self::Transfer => vk::QueueFlags::TRANSFER,
        }
    }

    /// Matching bit in a [`QueueRoles`] mask
    pub fn as_roles(self) -> QueueRoles {
        match self {
            Self::Graphics => QueueRoles::GRAPHICS,
            Self::Compute => QueueRoles::COMPUTE,
            Self::Transfer => QueueRoles::TRANSFER,
        }
    }

    /// Position of the role in [`QueueRole::ALL`]
    pub(crate) const fn index(self) -> usize {
        match self {
            Self::Graphics => 0,
            Self::Compute => 1,
            Self::Transfer => 2,
        }
    }
}

impl fmt::Display for QueueRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Graphics => "graphics",
            Self::Compute => "compute",
            Self::Transfer => "transfer",
        };
        f.write_str(name)
    }
}

bitflags! {
    /// Set of queue roles a device or family can serve
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct QueueRoles: u8 {
        /// Graphics capable
        const GRAPHICS = 1 << 0;
        /// Compute capable
        const COMPUTE = 1 << 1;
        /// Transfer capable
        const TRANSFER = 1 << 2;
    }
}

impl QueueRoles {
    /// Roles a family with the given capability flags can serve
    pub fn from_queue_flags(flags: vk::QueueFlags) -> Self {
        QueueRole::ALL
            .into_iter()
            .filter(|role| flags.contains(role.queue_flag()))
            .fold(Self::empty(), |roles, role| roles | role.as_roles())
    }

    /// Union of the roles every family can serve
    pub fn of_families(families: &[vk::QueueFamilyProperties]) -> Self {
        families
            .iter()
            .fold(Self::empty(), |roles, family| {
                roles | Self::from_queue_flags(family.queue_flags)
            })
    }
}

/// Queue family and queue index within that family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSlot {
    /// Queue family index
    pub family: u32,
    /// Queue index inside the family
    pub index: u32,
}

/// Role → queue family table for one physical device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueFamilyAssignment {
    slots: [QueueSlot; 3],
    family_queue_counts: Vec<u32>,
}

impl QueueFamilyAssignment {
    /// Derive the assignment from the device's queue family properties
    pub fn derive(families: &[vk::QueueFamilyProperties]) -> VulkanResult<Self> {
        let mut chosen: [Option<u32>; 3] = [None; 3];
        for (index, family) in (0u32..).zip(families) {
            for role in QueueRole::ALL {
                if family.queue_flags.contains(role.queue_flag()) {
                    chosen[role.index()] = Some(index);
                }
            }
        }

        let mut family_queue_counts = vec![0u32; families.len()];
        let mut slots = [QueueSlot { family: 0, index: 0 }; 3];
        for role in QueueRole::ALL {
            let family = chosen[role.index()].ok_or_else(|| {
                VulkanError::NoSuitableDevice(format!("no queue family supports {role} work"))
            })?;
            let counter = &mut family_queue_counts[family as usize];
            slots[role.index()] = QueueSlot {
                family,
                index: *counter,
            };
            *counter += 1;
        }

        for ((family, &required), properties) in
            (0u32..).zip(&family_queue_counts).zip(families)
        {
            if required > properties.queue_count {
                return Err(VulkanError::QueueOversubscription {
                    family,
                    required,
                    available: properties.queue_count,
                });
            }
        }

        Ok(Self {
            slots,
            family_queue_counts,
        })
    }

    /// Family and queue index serving `role`
    pub fn slot(&self, role: QueueRole) -> QueueSlot {
        self.slots[role.index()]
    }

    /// Family index serving `role`
    pub fn family(&self, role: QueueRole) -> u32 {
        self.slot(role).family
    }

    /// `(family, queue count)` for every family that needs at least one queue
    pub fn queue_requests(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (0u32..)
            .zip(&self.family_queue_counts)
            .filter(|&(_, &count)| count > 0)
            .map(|(family, &count)| (family, count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(queue_flags: vk::QueueFlags, queue_count: u32) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags,
            queue_count,
            ..Default::default()
        }
    }

    const ALL: vk::QueueFlags = vk::QueueFlags::from_raw(
        vk::QueueFlags::GRAPHICS.as_raw()
            | vk::QueueFlags::COMPUTE.as_raw()
            | vk::QueueFlags::TRANSFER.as_raw(),
    );

    #[test]
    fn test_single_family_serves_every_role() {
        let families = [family(ALL, 16)];
        let assignment = QueueFamilyAssignment::derive(&families).unwrap();

        assert_eq!(assignment.slot(QueueRole::Graphics), QueueSlot { family: 0, index: 0 });
        assert_eq!(assignment.slot(QueueRole::Compute), QueueSlot { family: 0, index: 1 });
        assert_eq!(assignment.slot(QueueRole::Transfer), QueueSlot { family: 0, index: 2 });
        assert_eq!(assignment.queue_requests().collect::<Vec<_>>(), vec![(0, 3)]);
    }

    #[test]
    fn test_last_matching_family_wins() {
        // Typical discrete layout: universal family, transfer-only, async compute
        let families = [
            family(ALL, 16),
            family(vk::QueueFlags::TRANSFER, 2),
            family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER, 8),
        ];
        let assignment = QueueFamilyAssignment::derive(&families).unwrap();

        assert_eq!(assignment.slot(QueueRole::Graphics), QueueSlot { family: 0, index: 0 });
        assert_eq!(assignment.slot(QueueRole::Compute), QueueSlot { family: 2, index: 0 });
        assert_eq!(assignment.slot(QueueRole::Transfer), QueueSlot { family: 2, index: 1 });
        assert_eq!(assignment.queue_requests().collect::<Vec<_>>(), vec![(0, 1), (2, 2)]);
    }

    #[test]
    fn test_oversubscribed_family_is_rejected() {
        let families = [family(ALL, 2)];
        let err = QueueFamilyAssignment::derive(&families).unwrap_err();

        assert!(matches!(
            err,
            VulkanError::QueueOversubscription { family: 0, required: 3, available: 2 }
        ));
    }

    #[test]
    fn test_missing_role_is_reported() {
        let families = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER, 4)];
        let err = QueueFamilyAssignment::derive(&families).unwrap_err();

        assert!(matches!(err, VulkanError::NoSuitableDevice(reason) if reason.contains("compute")));
    }

    #[test]
    fn test_roles_union_over_families() {
        let families = [
            family(vk::QueueFlags::GRAPHICS, 1),
            family(vk::QueueFlags::TRANSFER | vk::QueueFlags::SPARSE_BINDING, 1),
        ];
        let roles = QueueRoles::of_families(&families);

        assert_eq!(roles, QueueRoles::GRAPHICS | QueueRoles::TRANSFER);
        assert!(!roles.contains(QueueRoles::COMPUTE));
    }
}
