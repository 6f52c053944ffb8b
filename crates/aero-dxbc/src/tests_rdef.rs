use crate::rdef::{input_flags, input_type};
use crate::test_utils::{
    build_rdef_chunk, build_shader, TestBinding, TARGET_CS_5_0, TARGET_PS_5_1, TARGET_VS_5_0,
};
use crate::{parse_rdef_chunk, write_container, DxbcErrorKind, DxbcFile, FourCC, RdefProgramKind};
use pretty_assertions::assert_eq;

fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

#[test]
fn parse_rdef_resource_bindings_minimal() {
    // Single texture bound at t3, hand-assembled.
    let mut chunk = Vec::new();
    push_u32(&mut chunk, 0); // cb count
    push_u32(&mut chunk, 0); // cb offset
    push_u32(&mut chunk, 1); // resource count
    push_u32(&mut chunk, 28); // resource offset (header size)
    push_u32(&mut chunk, TARGET_VS_5_0);
    push_u32(&mut chunk, 0); // flags
    push_u32(&mut chunk, 0); // creator offset

    push_u32(&mut chunk, 60); // name offset
    push_u32(&mut chunk, input_type::TEXTURE);
    push_u32(&mut chunk, 5); // return type
    push_u32(&mut chunk, 4); // dimension
    push_u32(&mut chunk, 0); // num samples
    push_u32(&mut chunk, 3); // bind point
    push_u32(&mut chunk, 1); // bind count
    push_u32(&mut chunk, 0); // flags
    chunk.extend_from_slice(b"tex0\0");

    let rdef = parse_rdef_chunk(&chunk).unwrap();
    assert_eq!(rdef.creator, None);
    assert_eq!(rdef.program_kind(), Some(RdefProgramKind::Vertex));
    assert_eq!(rdef.shader_model(), (5, 0));
    assert!(rdef.constant_buffers.is_empty());
    assert_eq!(rdef.bound_resources.len(), 1);

    let tex = &rdef.bound_resources[0];
    assert_eq!(tex.name, "tex0");
    assert_eq!(tex.input_type, input_type::TEXTURE);
    assert_eq!(tex.return_type, 5);
    assert_eq!(tex.dimension, 4);
    assert_eq!(tex.bind_point, 3);
    assert_eq!(tex.bind_count, 1);
    assert_eq!(tex.space, 0);
}

#[test]
fn parse_rdef_constant_buffer_descriptor_and_creator() {
    let mut chunk = Vec::new();
    push_u32(&mut chunk, 1); // cb count
    push_u32(&mut chunk, 28); // cb offset
    push_u32(&mut chunk, 0); // resource count
    push_u32(&mut chunk, 0); // resource offset
    push_u32(&mut chunk, TARGET_CS_5_0);
    push_u32(&mut chunk, 0x100);
    push_u32(&mut chunk, 52); // creator offset

    push_u32(&mut chunk, 57); // name offset
    push_u32(&mut chunk, 3); // variable count
    push_u32(&mut chunk, 0); // variable offset
    push_u32(&mut chunk, 64); // size
    push_u32(&mut chunk, 0); // flags
    push_u32(&mut chunk, 0); // type
    chunk.extend_from_slice(b"fxc\0\0"); // creator + padding
    chunk.extend_from_slice(b"PerPass\0");

    let rdef = parse_rdef_chunk(&chunk).unwrap();
    assert_eq!(rdef.creator.as_deref(), Some("fxc"));
    assert_eq!(rdef.flags, 0x100);
    assert_eq!(rdef.program_kind(), Some(RdefProgramKind::Compute));
    assert_eq!(rdef.constant_buffers.len(), 1);
    assert_eq!(rdef.constant_buffers[0].name, "PerPass");
    assert_eq!(rdef.constant_buffers[0].variable_count, 3);
    assert_eq!(rdef.constant_buffers[0].size, 64);
}

#[test]
fn sm51_entries_carry_register_space() {
    let chunk = build_rdef_chunk(
        TARGET_PS_5_1,
        &[
            TestBinding::texture("albedo", 0),
            TestBinding::sampler("linear", 2).with_space(3),
        ],
    );
    let rdef = parse_rdef_chunk(&chunk).unwrap();
    assert_eq!(rdef.shader_model(), (5, 1));
    assert_eq!(rdef.bound_resources.len(), 2);
    assert_eq!(rdef.bound_resources[0].space, 0);
    assert_eq!(rdef.bound_resources[1].name, "linear");
    assert_eq!(rdef.bound_resources[1].bind_point, 2);
    assert_eq!(rdef.bound_resources[1].space, 3);
}

#[test]
fn builder_flags_survive_parsing() {
    let chunk = build_rdef_chunk(
        TARGET_VS_5_0,
        &[TestBinding::cbuffer("Unused", 4).with_flags(input_flags::UNUSED)],
    );
    let rdef = parse_rdef_chunk(&chunk).unwrap();
    assert_eq!(rdef.bound_resources[0].flags, input_flags::UNUSED);
}

#[test]
fn rejects_truncated_header() {
    let err = parse_rdef_chunk(&[0u8; 27]).unwrap_err();
    assert_eq!(err.kind(), DxbcErrorKind::InvalidChunk);
}

#[test]
fn rejects_resource_table_out_of_bounds() {
    let mut chunk = build_rdef_chunk(TARGET_VS_5_0, &[TestBinding::texture("t", 0)]);
    // Claim far more resources than the chunk holds.
    chunk[8..12].copy_from_slice(&64u32.to_le_bytes());
    let err = parse_rdef_chunk(&chunk).unwrap_err();
    assert_eq!(err.kind(), DxbcErrorKind::InvalidChunk);
}

#[test]
fn rejects_unterminated_name() {
    let mut chunk = build_rdef_chunk(TARGET_VS_5_0, &[TestBinding::texture("tex", 0)]);
    chunk.pop(); // drop the trailing NUL
    let err = parse_rdef_chunk(&chunk).unwrap_err();
    assert!(err.context().contains("not NUL-terminated"), "{err}");
}

#[test]
fn dxbc_get_rdef_falls_back_to_rd11() {
    let rdef = build_rdef_chunk(TARGET_VS_5_0, &[TestBinding::cbuffer("cb0", 0)]);
    let bytes = write_container(&[(FourCC::RD11, &rdef)]);
    let dxbc = DxbcFile::parse(&bytes).unwrap();

    let parsed = dxbc.get_rdef().expect("missing RDEF").unwrap();
    assert_eq!(parsed.bound_resources[0].name, "cb0");
}

#[test]
fn dxbc_get_rdef_prefers_valid_rdef_over_broken_one() {
    let broken = [0u8; 4];
    let good = build_rdef_chunk(TARGET_VS_5_0, &[TestBinding::uav("out", 1)]);
    let bytes = write_container(&[(FourCC::RDEF, &broken), (FourCC::RDEF, &good)]);
    let dxbc = DxbcFile::parse(&bytes).unwrap();

    let parsed = dxbc.get_rdef().unwrap().unwrap();
    assert_eq!(parsed.bound_resources[0].input_type, input_type::UAV_RWTYPED);
}

#[test]
fn dxbc_get_rdef_reports_first_error() {
    let bytes = write_container(&[(FourCC::RDEF, &[0u8; 4])]);
    let dxbc = DxbcFile::parse(&bytes).unwrap();
    let err = dxbc.get_rdef().unwrap().unwrap_err();
    assert!(err.context().starts_with("RDEF chunk:"), "{err}");
}

#[test]
fn build_shader_contains_rdef_and_bytecode() {
    let bytes = build_shader(TARGET_VS_5_0, &[TestBinding::cbuffer("cb", 0)], b"body");
    let dxbc = DxbcFile::parse(&bytes).unwrap();
    assert_eq!(dxbc.find_first_shader_chunk().unwrap().data, b"body");
    assert!(dxbc.get_rdef().unwrap().is_ok());
}
