use std::env;
use std::fs;
use std::path::PathBuf;
use std::process;

use aero_d3d12::resource_mapping::DescriptorHeapType;
use aero_d3d12::{
    serialize_root_signature, PipelineCacheConfig, ReflectionConfig, RootParameter,
    RootSignatureDesc, RootSignatureInit, ShaderStage, ShaderStageBinding,
};
use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;

fn usage() -> &'static str {
    "\
rootsig_dump: reflect DXBC shaders and print the root signature layout built for them

USAGE:
    cargo run -p aero-d3d12 --bin rootsig_dump -- [--vs F] [--hs F] [--ds F] [--gs F] [--ps F]
    cargo run -p aero-d3d12 --bin rootsig_dump -- --cs F

FLAGS:
    --vs/--hs/--ds/--gs/--ps F    Graphics stage shader containers
    --cs F                        Compute shader container (excludes graphics stages)
    --shared-cb N                 Treat constant buffer register N as shared (repeatable)

Merge policy and other cache settings are read from the AERO_D3D12_* environment variables.
Set RUST_LOG=debug for reflection details.
"
}

fn main() {
    if let Err(err) = real_main() {
        eprintln!("error: {err:#}");
        process::exit(1);
    }
}

fn real_main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut graphics: [Option<PathBuf>; 5] = Default::default();
    let mut compute: Option<PathBuf> = None;
    let mut reflection = ReflectionConfig::from_env();

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        let stage = match arg.as_str() {
            "-h" | "--help" => {
                print!("{}", usage());
                return Ok(());
            }
            "--vs" => Some(ShaderStage::Vertex),
            "--hs" => Some(ShaderStage::Hull),
            "--ds" => Some(ShaderStage::Domain),
            "--gs" => Some(ShaderStage::Geometry),
            "--ps" => Some(ShaderStage::Pixel),
            "--cs" => Some(ShaderStage::Compute),
            "--shared-cb" => {
                let Some(v) = args.next() else {
                    bail!("--shared-cb requires a value");
                };
                let slot = v
                    .parse::<u32>()
                    .with_context(|| format!("invalid --shared-cb value {v:?}"))?;
                reflection.shared_constant_buffer_slots.push(slot);
                None
            }
            _ => bail!("unexpected argument {arg:?}\n\n{}", usage()),
        };

        if let Some(stage) = stage {
            let Some(path) = args.next() else {
                bail!("{arg} requires a path");
            };
            let slot = match stage {
                ShaderStage::Compute => &mut compute,
                _ => &mut graphics[stage.index()],
            };
            if slot.is_some() {
                bail!("{arg} given more than once");
            }
            *slot = Some(PathBuf::from(path));
        }
    }

    let has_graphics = graphics.iter().any(Option::is_some);
    if compute.is_some() && has_graphics {
        bail!("--cs cannot be combined with graphics stages\n\n{}", usage());
    }
    if compute.is_none() && !has_graphics {
        bail!("no shaders given\n\n{}", usage());
    }

    let load = |path: &PathBuf| -> anyhow::Result<ShaderStageBinding> {
        let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
        ShaderStageBinding::from_dxbc(bytes, &reflection)
            .with_context(|| format!("reflect {}", path.display()))
    };

    let mut graphics_shaders: [Option<ShaderStageBinding>; 5] = Default::default();
    for (slot, path) in graphics_shaders.iter_mut().zip(&graphics) {
        if let Some(path) = path {
            *slot = Some(load(path)?);
        }
    }
    let compute_shader = compute.as_ref().map(load).transpose()?;

    let init = match &compute_shader {
        Some(cs) => RootSignatureInit::compute(cs, 0),
        None => RootSignatureInit::graphics(graphics_shaders.each_ref().map(Option::as_ref), 0),
    };
    for shader in graphics_shaders.iter().flatten().chain(&compute_shader) {
        println!(
            "{:?}: content_hash={:#018x} bytes={}",
            shader.stage(),
            shader.id().content_hash,
            shader.bytecode().bytes().len()
        );
    }

    let config = PipelineCacheConfig::from_env();
    let (mappings, flags) = init.plan(&config.merge)?;

    println!("flags: {flags:?}");
    println!("root parameters ({}):", mappings.root_parameters().len());
    for (index, param) in mappings.root_parameters().iter().enumerate() {
        match param {
            RootParameter::DescriptorTable { table, .. } => {
                let layout = mappings.descriptor_tables()[*table as usize];
                let heap = match layout.heap_type {
                    DescriptorHeapType::CbvSrvUav => "cbv/srv/uav",
                    DescriptorHeapType::Sampler => "sampler",
                };
                println!(
                    "  [{index}] table #{table} {heap} offset={} visibility={:?}",
                    layout.offset,
                    param.visibility()
                );
                for range in mappings.table_ranges(param) {
                    println!(
                        "        {:?} base={} count={} offset_in_table={}",
                        range.range_type,
                        range.base_register,
                        range.num_descriptors,
                        range.offset_in_table
                    );
                }
            }
            other => println!("  [{index}] {other:?}"),
        }
    }

    println!("resources ({}):", mappings.resources().len());
    for (index, res) in mappings.resources().iter().enumerate() {
        println!("  [{index}] {:?} {:?} slot={}", res.stage, res.view_type, res.slot);
    }
    println!("samplers ({}):", mappings.samplers().len());
    for (index, res) in mappings.samplers().iter().enumerate() {
        println!("  [{index}] {:?} slot={}", res.stage, res.slot);
    }
    println!("shared constant buffers: {:?}", mappings.shared_constant_buffers());

    let blob = serialize_root_signature(&RootSignatureDesc { mappings, flags });
    println!("serialized root signature: {} bytes", blob.len());
    Ok(())
}
