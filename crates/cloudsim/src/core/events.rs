//! Standard simulation events.

// VM EVENTS ///////////////////////////////////////////////////////////////////////////////////////

pub mod vm {
    use serde::Serialize;

    use crate::core::vm::VmSpec;

    /// Result of VM creation or destruction.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
    pub enum AckStatus {
        Ok,
        Failed,
    }

    #[derive(Serialize)]
    pub struct VmCreateRequest {
        pub vm: VmSpec,
    }

    #[derive(Serialize)]
    pub struct VmCreateAck {
        pub vm_id: u32,
        pub datacenter_id: u32,
        pub host_id: Option<u32>,
        pub status: AckStatus,
    }

    #[derive(Serialize)]
    pub struct VmDestroyRequest {
        pub vm_id: u32,
    }

    #[derive(Serialize)]
    pub struct VmDestroyAck {
        pub vm_id: u32,
        pub datacenter_id: u32,
        pub status: AckStatus,
    }
}

// CLOUDLET EVENTS /////////////////////////////////////////////////////////////////////////////////

pub mod cloudlet {
    use serde::Serialize;

    use crate::core::cloudlet::Cloudlet;

    #[derive(Serialize)]
    pub struct CloudletSubmit {
        pub cloudlet: Cloudlet,
    }

    #[derive(Serialize)]
    pub struct CloudletReturn {
        pub cloudlet: Cloudlet,
    }

    #[derive(Serialize)]
    pub struct CloudletCancel {
        pub cloudlet_id: u32,
    }
}

// DATACENTER EVENTS ///////////////////////////////////////////////////////////////////////////////

pub mod datacenter {
    use serde::Serialize;

    /// Triggers recomputation of cloudlets progress.
    #[derive(Serialize)]
    pub struct UpdateProcessing {}
}

// BROKER EVENTS ///////////////////////////////////////////////////////////////////////////////////

pub mod broker {
    use serde::Serialize;

    #[derive(Serialize)]
    pub struct BrokerStart {}

    /// Asks the broker to withdraw its VM.
    #[derive(Serialize)]
    pub struct DestroyVm {
        pub vm_id: u32,
    }

    /// Asks the broker to withdraw its cloudlet.
    #[derive(Serialize)]
    pub struct CancelCloudlet {
        pub cloudlet_id: u32,
    }
}
