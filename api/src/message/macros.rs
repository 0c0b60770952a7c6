// Licensed under the Apache-2.0 license

/// Define the open/close request pair of a service family.
///
/// Every service opens with the same layout on a parent handle (session or
/// key store) and closes with its own handle. The macro generates the wire
/// structs and the `prepare_open`, `proc_rsp_open` and `prepare_close`
/// functions used by the dispatch table.
macro_rules! define_service_messages {
    (
        open: $open_req:ident($open_id:expr, $parent:ident) -> $open_rsp:ident($handle:ident),
        close: $close_req:ident($close_id:expr) $(,)?
    ) => {
        #[repr(C)]
        #[derive(
            Debug,
            Default,
            Clone,
            Copy,
            zerocopy::IntoBytes,
            zerocopy::FromBytes,
            zerocopy::Immutable,
            zerocopy::KnownLayout,
            PartialEq,
            Eq,
        )]
        pub struct $open_req {
            pub hdr: $crate::message::MuHdr,
            pub $parent: u32,
            pub input_address_ext: u32,
            pub output_address_ext: u32,
            pub flags: u8,
            pub reserved: [u8; 3],
            pub crc: u32,
        }
        impl $crate::message::Request for $open_req {
            const ID: $crate::message::MsgId = $open_id;
            const CRC: bool = true;
            type Resp = $open_rsp;
        }

        #[repr(C)]
        #[derive(
            Debug,
            Default,
            Clone,
            Copy,
            zerocopy::IntoBytes,
            zerocopy::FromBytes,
            zerocopy::Immutable,
            zerocopy::KnownLayout,
            PartialEq,
            Eq,
        )]
        pub struct $open_rsp {
            pub hdr: $crate::message::MuHdr,
            pub rsp_code: u32,
            pub $handle: u32,
        }
        impl $crate::message::Response for $open_rsp {}

        #[repr(C)]
        #[derive(
            Debug,
            Default,
            Clone,
            Copy,
            zerocopy::IntoBytes,
            zerocopy::FromBytes,
            zerocopy::Immutable,
            zerocopy::KnownLayout,
            PartialEq,
            Eq,
        )]
        pub struct $close_req {
            pub hdr: $crate::message::MuHdr,
            pub $handle: u32,
        }
        impl $crate::message::Request for $close_req {
            const ID: $crate::message::MsgId = $close_id;
            type Resp = $crate::message::StatusRsp;
        }

        pub(crate) fn prepare_open(
            ctx: &mut $crate::message::PrepareCtx<'_>,
            args: &mut $crate::message::MsgArgs<'_>,
            cmd: &mut [u8],
        ) -> $crate::HsmApiResult<$crate::message::Prepared> {
            let $crate::message::MsgArgs::Open(args) = args else {
                return Err($crate::message::arg_mismatch());
            };
            $crate::message::encode(
                cmd,
                &$open_req {
                    $parent: ctx.msg_hdl,
                    flags: args.flags,
                    ..Default::default()
                },
            )
        }

        pub(crate) fn proc_rsp_open(
            rsp: &[u8],
            args: &mut $crate::message::MsgArgs<'_>,
            _flavor: $crate::message::MessageFlavor,
        ) -> $crate::HsmApiResult<()> {
            let $crate::message::MsgArgs::Open(args) = args else {
                return Err($crate::message::arg_mismatch());
            };
            args.handle = $crate::message::decode::<$open_rsp>(rsp)?.$handle;
            Ok(())
        }

        pub(crate) fn prepare_close(
            ctx: &mut $crate::message::PrepareCtx<'_>,
            _args: &mut $crate::message::MsgArgs<'_>,
            cmd: &mut [u8],
        ) -> $crate::HsmApiResult<$crate::message::Prepared> {
            $crate::message::encode(
                cmd,
                &$close_req {
                    $handle: ctx.msg_hdl,
                    ..Default::default()
                },
            )
        }
    };
}
