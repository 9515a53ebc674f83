use crate::fractal::sampler::PointBatch;
use crate::visual::display::DisplayParams;
use crate::visual::{Surface, SurfaceError, ViewTransform};
use metal::*;
use objc::rc::autoreleasepool;
use std::ffi::c_void;

const INITIAL_POINT_CAPACITY: usize = 1 << 14;

#[repr(C)]
#[derive(Clone, Copy)]
struct PointUniforms {
    pan: [f32; 2],
    aspect: [f32; 2],
    zoom: f32,
    point_size: f32,
    intensity: f32,
    _pad: f32,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Blend {
    Replace,
    Additive,
    /// `dst · blend_color`; the fragment output is ignored.
    Decay,
}

pub struct MetalSurface {
    device: Device,
    queue: CommandQueue,
    accumulate_pipeline: RenderPipelineState,
    fade_pipeline: RenderPipelineState,
    display_pipeline: RenderPipelineState,
    sampler: SamplerState,

    w: usize,
    h: usize,
    accum: Texture,
    output: Texture,
    readback: Buffer,
    readback_bpr: usize,

    positions: Buffer,
    colors: Buffer,
    point_capacity: usize,

    pixels: Vec<u8>,
}

impl MetalSurface {
    pub fn new(w: usize, h: usize) -> Result<Self, SurfaceError> {
        let device = Device::system_default().ok_or(SurfaceError::DeviceUnavailable)?;
        let queue = device.new_command_queue();

        let options = CompileOptions::new();
        options.set_fast_math_enabled(true);
        let library = device
            .new_library_with_source(METAL_SRC, &options)
            .map_err(SurfaceError::ShaderCompile)?;

        let accumulate_pipeline = make_pipeline(
            &device,
            &library,
            "accumulate_vertex",
            "accumulate_fragment",
            MTLPixelFormat::RGBA32Float,
            Blend::Additive,
        )?;
        let fade_pipeline = make_pipeline(
            &device,
            &library,
            "fullscreen_vertex",
            "fade_fragment",
            MTLPixelFormat::RGBA32Float,
            Blend::Decay,
        )?;
        let display_pipeline = make_pipeline(
            &device,
            &library,
            "fullscreen_vertex",
            "display_fragment",
            MTLPixelFormat::RGBA8Unorm,
            Blend::Replace,
        )?;

        let sampler = {
            let desc = SamplerDescriptor::new();
            desc.set_min_filter(MTLSamplerMinMagFilter::Nearest);
            desc.set_mag_filter(MTLSamplerMinMagFilter::Nearest);
            desc.set_address_mode_s(MTLSamplerAddressMode::ClampToZero);
            desc.set_address_mode_t(MTLSamplerAddressMode::ClampToZero);
            device.new_sampler(&desc)
        };

        let (w, h) = (w.max(1), h.max(1));
        let (accum, output, readback, readback_bpr, pixels) = make_targets(&device, w, h)?;
        let (positions, colors) = make_point_buffers(&device, INITIAL_POINT_CAPACITY);

        tracing::info!(device = device.name(), "metal surface created");
        let mut surface = Self {
            device,
            queue,
            accumulate_pipeline,
            fade_pipeline,
            display_pipeline,
            sampler,
            w,
            h,
            accum,
            output,
            readback,
            readback_bpr,
            positions,
            colors,
            point_capacity: INITIAL_POINT_CAPACITY,
            pixels,
        };
        surface.clear_accumulation();
        Ok(surface)
    }

    fn ensure_point_capacity(&mut self, n: usize) {
        if n <= self.point_capacity {
            return;
        }
        let cap = n.next_power_of_two();
        let (positions, colors) = make_point_buffers(&self.device, cap);
        self.positions = positions;
        self.colors = colors;
        self.point_capacity = cap;
    }

    /// Encode one render pass into the accumulation target.
    fn accum_pass(&self, load: MTLLoadAction, encode: impl FnOnce(&RenderCommandEncoderRef)) {
        autoreleasepool(|| {
            let cmd = self.queue.new_command_buffer();
            let desc = RenderPassDescriptor::new();
            if let Some(att) = desc.color_attachments().object_at(0) {
                att.set_texture(Some(&self.accum));
                att.set_load_action(load);
                att.set_clear_color(MTLClearColor::new(0.0, 0.0, 0.0, 0.0));
                att.set_store_action(MTLStoreAction::Store);
            }
            let encoder = cmd.new_render_command_encoder(desc);
            encode(encoder);
            encoder.end_encoding();
            cmd.commit();
        });
    }
}

impl Surface for MetalSurface {
    fn name(&self) -> &'static str {
        "metal"
    }

    fn resize(&mut self, w: usize, h: usize) -> Result<(), SurfaceError> {
        if w == 0 || h == 0 {
            return Err(SurfaceError::InvalidSize { w, h });
        }
        if w == self.w && h == self.h {
            return Ok(());
        }
        let (accum, output, readback, readback_bpr, pixels) = make_targets(&self.device, w, h)?;
        self.accum = accum;
        self.output = output;
        self.readback = readback;
        self.readback_bpr = readback_bpr;
        self.pixels = pixels;
        self.w = w;
        self.h = h;
        self.clear_accumulation();
        Ok(())
    }

    fn size(&self) -> (usize, usize) {
        (self.w, self.h)
    }

    fn clear_accumulation(&mut self) {
        self.accum_pass(MTLLoadAction::Clear, |_| {});
    }

    fn fade_accumulation(&mut self, decay: f32) {
        let pipeline = &self.fade_pipeline;
        self.accum_pass(MTLLoadAction::Load, |enc| {
            enc.set_render_pipeline_state(pipeline);
            enc.set_blend_color(decay, decay, decay, decay);
            enc.draw_primitives(MTLPrimitiveType::Triangle, 0, 3);
        });
    }

    fn accumulate(&mut self, batch: &PointBatch, view: &ViewTransform) -> Result<(), SurfaceError> {
        let n = batch.len();
        if n == 0 {
            return Ok(());
        }
        self.ensure_point_capacity(n);
        // The previous frame's display pass waited for completion, so the buffers are idle.
        unsafe {
            std::ptr::copy_nonoverlapping(
                batch.positions.as_ptr(),
                self.positions.contents().cast::<f32>(),
                n * 2,
            );
            std::ptr::copy_nonoverlapping(
                batch.colors.as_ptr(),
                self.colors.contents().cast::<f32>(),
                n * 3,
            );
        }

        let uniforms = PointUniforms {
            pan: view.pan,
            aspect: view.aspect,
            zoom: view.zoom,
            point_size: view.point_size,
            intensity: view.intensity,
            _pad: 0.0,
        };
        let pipeline = &self.accumulate_pipeline;
        let (positions, colors) = (&self.positions, &self.colors);
        self.accum_pass(MTLLoadAction::Load, |enc| {
            enc.set_render_pipeline_state(pipeline);
            enc.set_vertex_buffer(0, Some(positions), 0);
            enc.set_vertex_buffer(1, Some(colors), 0);
            enc.set_vertex_bytes(
                2,
                std::mem::size_of::<PointUniforms>() as u64,
                (&uniforms as *const PointUniforms).cast::<c_void>(),
            );
            enc.draw_primitives(MTLPrimitiveType::Point, 0, n as u64);
        });
        Ok(())
    }

    fn display(&mut self, params: &DisplayParams) -> Result<(), SurfaceError> {
        let (w, h) = (self.w, self.h);
        let cmd = autoreleasepool(|| {
            let cmd = self.queue.new_command_buffer();

            let desc = RenderPassDescriptor::new();
            if let Some(att) = desc.color_attachments().object_at(0) {
                att.set_texture(Some(&self.output));
                att.set_load_action(MTLLoadAction::DontCare);
                att.set_store_action(MTLStoreAction::Store);
            }
            let encoder = cmd.new_render_command_encoder(desc);
            encoder.set_render_pipeline_state(&self.display_pipeline);
            encoder.set_fragment_texture(0, Some(&self.accum));
            encoder.set_fragment_sampler_state(0, Some(&self.sampler));
            encoder.set_fragment_bytes(
                0,
                std::mem::size_of::<DisplayParams>() as u64,
                (params as *const DisplayParams).cast::<c_void>(),
            );
            encoder.draw_primitives(MTLPrimitiveType::Triangle, 0, 3);
            encoder.end_encoding();

            let blit = cmd.new_blit_command_encoder();
            blit.copy_from_texture_to_buffer(
                &self.output,
                0,
                0,
                MTLOrigin { x: 0, y: 0, z: 0 },
                MTLSize::new(w as u64, h as u64, 1),
                &self.readback,
                0,
                self.readback_bpr as u64,
                (self.readback_bpr.saturating_mul(h)) as u64,
                MTLBlitOption::None,
            );
            blit.end_encoding();

            // Retain the command buffer so it survives the autoreleasepool.
            let owned = cmd.to_owned();
            owned.commit();
            owned
        });
        cmd.wait_until_completed();

        let row_bytes = w.saturating_mul(4);
        unsafe {
            let src = std::slice::from_raw_parts(
                self.readback.contents().cast::<u8>(),
                self.readback_bpr.saturating_mul(h),
            );
            for y in 0..h {
                let s = y * self.readback_bpr;
                let d = y * row_bytes;
                self.pixels[d..d + row_bytes].copy_from_slice(&src[s..s + row_bytes]);
            }
        }
        Ok(())
    }

    fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

fn make_pipeline(
    device: &Device,
    library: &Library,
    vertex: &str,
    fragment: &str,
    format: MTLPixelFormat,
    blend: Blend,
) -> Result<RenderPipelineState, SurfaceError> {
    let vf = library
        .get_function(vertex, None)
        .map_err(|e| SurfaceError::ShaderCompile(format!("{vertex}: {e}")))?;
    let ff = library
        .get_function(fragment, None)
        .map_err(|e| SurfaceError::ShaderCompile(format!("{fragment}: {e}")))?;

    let desc = RenderPipelineDescriptor::new();
    desc.set_vertex_function(Some(&vf));
    desc.set_fragment_function(Some(&ff));
    let att = desc
        .color_attachments()
        .object_at(0)
        .ok_or_else(|| SurfaceError::Pipeline(format!("{fragment}: no colour attachment")))?;
    att.set_pixel_format(format);
    match blend {
        Blend::Replace => att.set_blending_enabled(false),
        Blend::Additive => {
            att.set_blending_enabled(true);
            att.set_rgb_blend_operation(MTLBlendOperation::Add);
            att.set_alpha_blend_operation(MTLBlendOperation::Add);
            att.set_source_rgb_blend_factor(MTLBlendFactor::One);
            att.set_destination_rgb_blend_factor(MTLBlendFactor::One);
            att.set_source_alpha_blend_factor(MTLBlendFactor::One);
            att.set_destination_alpha_blend_factor(MTLBlendFactor::One);
        }
        Blend::Decay => {
            att.set_blending_enabled(true);
            att.set_rgb_blend_operation(MTLBlendOperation::Add);
            att.set_alpha_blend_operation(MTLBlendOperation::Add);
            att.set_source_rgb_blend_factor(MTLBlendFactor::Zero);
            att.set_destination_rgb_blend_factor(MTLBlendFactor::BlendColor);
            att.set_source_alpha_blend_factor(MTLBlendFactor::Zero);
            att.set_destination_alpha_blend_factor(MTLBlendFactor::BlendAlpha);
        }
    }

    device
        .new_render_pipeline_state(&desc)
        .map_err(|e| SurfaceError::Pipeline(format!("{fragment}: {e}")))
}

fn make_point_buffers(device: &Device, capacity: usize) -> (Buffer, Buffer) {
    let f = std::mem::size_of::<f32>();
    let positions = device.new_buffer((capacity * 2 * f) as u64, MTLResourceOptions::StorageModeShared);
    let colors = device.new_buffer((capacity * 3 * f) as u64, MTLResourceOptions::StorageModeShared);
    (positions, colors)
}

fn make_targets(
    device: &Device,
    w: usize,
    h: usize,
) -> Result<(Texture, Texture, Buffer, usize, Vec<u8>), SurfaceError> {
    if w == 0 || h == 0 {
        return Err(SurfaceError::InvalidSize { w, h });
    }

    let desc = TextureDescriptor::new();
    desc.set_texture_type(MTLTextureType::D2);
    desc.set_width(w as u64);
    desc.set_height(h as u64);
    desc.set_storage_mode(MTLStorageMode::Private);
    desc.set_usage(MTLTextureUsage::RenderTarget | MTLTextureUsage::ShaderRead);

    desc.set_pixel_format(MTLPixelFormat::RGBA32Float);
    let accum = device.new_texture(&desc);
    desc.set_pixel_format(MTLPixelFormat::RGBA8Unorm);
    let output = device.new_texture(&desc);

    let align = (device.minimum_linear_texture_alignment_for_pixel_format(MTLPixelFormat::RGBA8Unorm)
        as usize)
        .max(16);
    let row_bytes = w.saturating_mul(4);
    let readback_bpr = row_bytes.div_ceil(align) * align;
    let readback_len = readback_bpr.saturating_mul(h);
    if readback_len == 0 {
        return Err(SurfaceError::Allocation { w, h });
    }
    let readback = device.new_buffer(readback_len as u64, MTLResourceOptions::StorageModeShared);

    Ok((accum, output, readback, readback_bpr, vec![0u8; row_bytes.saturating_mul(h)]))
}

const METAL_SRC: &str = r#"
#include <metal_stdlib>
using namespace metal;

struct PointUniforms {
    float2 pan;
    float2 aspect;
    float zoom;
    float point_size;
    float intensity;
    float _pad;
};

struct DisplayParams {
    float2 texel;
    float time;
    float brightness;

    float4 color_low;
    float4 color_high;
    float4 background;

    float tunnel;
    float spiral;
    float wave;
    float radial_pulse;
    float ripple;
    float rotation;
    float kaleidoscope;
    float feedback_zoom;
    float noise_warp;
    float pixelate;

    float chromatic_aberration;
    float prism;

    float bloom;
    float edge_glow;
    float posterize;
    float hue_shift;

    uint colored;
    uint _pad0;
    uint _pad1;
    uint _pad2;
};

constant float DENSITY_THRESHOLD = 1e-4;
constant float MIN_BACKGROUND = 0.015;
constant float TAU = 6.2831853;

struct PointOut {
    float4 position [[position]];
    float point_size [[point_size]];
    float4 color;
};

vertex PointOut accumulate_vertex(
    uint vid [[vertex_id]],
    const device float2* positions [[buffer(0)]],
    const device packed_float3* colors [[buffer(1)]],
    constant PointUniforms& u [[buffer(2)]]
) {
    PointOut o;
    float2 p = (positions[vid] - u.pan) * u.zoom * u.aspect;
    o.position = float4(p, 0.0, 1.0);
    o.point_size = u.point_size;
    float3 c = float3(colors[vid]);
    o.color = float4(c * u.intensity, u.intensity);
    return o;
}

fragment float4 accumulate_fragment(PointOut in [[stage_in]]) {
    return in.color;
}

struct QuadOut {
    float4 position [[position]];
    float2 uv;
};

vertex QuadOut fullscreen_vertex(uint vid [[vertex_id]]) {
    float2 p = float2((vid << 1) & 2, vid & 2);
    QuadOut o;
    o.position = float4(p * 2.0 - 1.0, 0.0, 1.0);
    o.uv = float2(p.x, 1.0 - p.y);
    return o;
}

fragment float4 fade_fragment(QuadOut in [[stage_in]]) {
    return float4(0.0);
}

static inline float tonemap(float d, float b) {
    d = max(d, 0.0);
    if (!(b > 0.0)) {
        return min(d, 1.0);
    }
    return clamp(log(1.0 + d * b) / log(1.0 + b), 0.0, 1.0);
}

static inline float2 rot(float2 p, float a) {
    float s = sin(a);
    float c = cos(a);
    return float2(c*p.x - s*p.y, s*p.x + c*p.y);
}

static inline float fbm(float2 p) {
    float f = 0.0;
    float a = 0.5;
    for (int i = 0; i < 5; i++) {
        f += a * (sin(p.x) * cos(p.y));
        p = rot(p * 1.7, 1.2);
        a *= 0.55;
    }
    return f;
}

static float2 distort_uv(float2 uv, constant DisplayParams& p) {
    float t = p.time;
    float2 c = uv - 0.5;

    if (p.tunnel != 0.0) {
        float r = length(c);
        c *= 1.0 / (1.0 + p.tunnel * max(0.5 - r, 0.0) * 2.0);
    }
    if (p.spiral != 0.0) {
        c = rot(c, p.spiral * length(c) * TAU);
    }
    if (p.wave != 0.0) {
        float2 q = c;
        c.x = q.x + p.wave * 0.05 * sin(q.y * 12.0 + t * 2.0);
        c.y = q.y + p.wave * 0.05 * sin(q.x * 12.0 + t * 1.7);
    }
    if (p.radial_pulse != 0.0) {
        c *= 1.0 + p.radial_pulse * 0.08 * sin(t * 3.0 - length(c) * 10.0);
    }
    if (p.ripple != 0.0) {
        float r = length(c);
        if (r > 1e-6) {
            c += c * (p.ripple * 0.02 * sin(r * 40.0 - t * 4.0) / r);
        }
    }
    if (p.rotation != 0.0) {
        c = rot(c, p.rotation);
    }
    if (p.kaleidoscope >= 2.0) {
        float r = length(c);
        float seg = TAU / p.kaleidoscope;
        float a = atan2(c.y, c.x);
        a = a - seg * floor(a / seg);
        if (a > seg * 0.5) {
            a = seg - a;
        }
        c = float2(r * cos(a), r * sin(a));
    }
    if (p.feedback_zoom != 0.0) {
        c *= 1.0 - p.feedback_zoom * 0.25 * (0.5 + 0.5 * sin(t * 0.5));
    }
    if (p.noise_warp != 0.0) {
        float2 q = float2(c.x * 4.0 + t * 0.3, c.y * 4.0 - t * 0.2);
        c += p.noise_warp * 0.05 * float2(fbm(q), fbm(q + float2(5.2, 1.3)));
    }

    float2 o = c + 0.5;
    if (p.pixelate > 0.0) {
        float cells = max(1.0 / (p.pixelate * 0.02), 2.0);
        o = (floor(o * cells) + 0.5) / cells;
    }
    return o;
}

static inline float3 hue_rotate(float3 rgb, float a) {
    float y = dot(rgb, float3(0.299, 0.587, 0.114));
    float i = dot(rgb, float3(0.596, -0.274, -0.322));
    float q = dot(rgb, float3(0.211, -0.523, 0.312));
    float s = sin(a);
    float c = cos(a);
    float i2 = i * c - q * s;
    float q2 = i * s + q * c;
    return float3(
        y + 0.956 * i2 + 0.621 * q2,
        y - 0.272 * i2 - 0.647 * q2,
        y - 1.106 * i2 + 1.703 * q2
    );
}

static inline float3 background_fill(float2 uv, constant DisplayParams& p) {
    float2 d = uv - 0.5;
    float vignette = 1.0 - 0.35 * length(d);
    float shimmer = 1.0 + 0.05 * sin(p.time * 0.3 + uv.y * 3.0);
    return max(p.background.rgb * vignette * shimmer, float3(MIN_BACKGROUND));
}

fragment float4 display_fragment(
    QuadOut in [[stage_in]],
    texture2d<float> accum [[texture(0)]],
    sampler s [[sampler(0)]],
    constant DisplayParams& p [[buffer(0)]]
) {
    float2 uv = in.uv;
    float2 duv = distort_uv(uv, p);
    float4 center = accum.sample(s, duv);

    float2 off0 = float2(0.0);
    float2 off1 = float2(0.0);
    float2 off2 = float2(0.0);
    if (p.chromatic_aberration != 0.0) {
        float2 dir = (duv - 0.5) * (p.chromatic_aberration * 0.02);
        off0 = dir;
        off2 = -dir;
    }
    if (p.prism != 0.0) {
        float k = p.prism * 0.004;
        float a = p.time * 0.5;
        off0 += float2(cos(a), sin(a)) * k;
        off1 += float2(cos(a + TAU / 3.0), sin(a + TAU / 3.0)) * k;
        off2 += float2(cos(a + 2.0 * TAU / 3.0), sin(a + 2.0 * TAU / 3.0)) * k;
    }
    float4 sr = accum.sample(s, duv + off0);
    float4 sg = accum.sample(s, duv + off1);
    float4 sb = accum.sample(s, duv + off2);

    float density = max(max(center.a, sr.a), max(sg.a, sb.a));
    if (density < DENSITY_THRESHOLD) {
        return float4(background_fill(uv, p), 1.0);
    }

    float b = p.brightness;
    float3 rgb;
    if (p.colored != 0) {
        rgb = float3(tonemap(sr.r, b), tonemap(sg.g, b), tonemap(sb.b, b));
    } else {
        rgb = float3(
            mix(p.color_low.r, p.color_high.r, tonemap(sr.a, b)),
            mix(p.color_low.g, p.color_high.g, tonemap(sg.a, b)),
            mix(p.color_low.b, p.color_high.b, tonemap(sb.a, b))
        );
    }

    if (p.bloom > 0.0) {
        float luma = dot(rgb, float3(0.2126, 0.7152, 0.0722));
        rgb += p.bloom * rgb * luma;
    }
    if (p.edge_glow > 0.0) {
        float2 tx = float2(p.texel.x, 0.0);
        float2 ty = float2(0.0, p.texel.y);
        float grad = abs(tonemap(accum.sample(s, duv + tx).a, b) - tonemap(accum.sample(s, duv - tx).a, b))
                   + abs(tonemap(accum.sample(s, duv + ty).a, b) - tonemap(accum.sample(s, duv - ty).a, b));
        rgb += p.edge_glow * grad * p.color_high.rgb;
    }
    if (p.posterize >= 2.0) {
        float n = floor(p.posterize) - 1.0;
        rgb = round(clamp(rgb, 0.0, 1.0) * n) / n;
    }
    if (p.hue_shift != 0.0) {
        rgb = hue_rotate(rgb, p.hue_shift);
    }
    return float4(clamp(rgb, 0.0, 1.0), 1.0);
}
"#;
