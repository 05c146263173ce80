//! WGSL shader sources.

/// Fullscreen present: maps the console framebuffer onto the computed
/// viewport, paints letterbox black outside it, and gamma-encodes when the
/// surface is not an sRGB format.
pub const PRESENT: &str = r#"
struct PresentParams {
    // Viewport rect in backbuffer pixels: x, y, w, h.
    viewport: vec4<f32>,
    // x: 1 = gamma-encode in shader (non-sRGB swapchain).
    flags: vec4<u32>,
};

@group(0) @binding(0) var cbuf_texture: texture_2d<f32>;
@group(0) @binding(1) var cbuf_sampler: sampler;
@group(0) @binding(2) var<uniform> params: PresentParams;

struct VsOut {
    @builtin(position) position: vec4<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> VsOut {
    // One oversized triangle covering the whole backbuffer.
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    var out: VsOut;
    out.position = vec4<f32>(uv * 2.0 - 1.0, 0.0, 1.0);
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    let uv = (in.position.xy - params.viewport.xy) / params.viewport.zw;
    if (uv.x < 0.0 || uv.x >= 1.0 || uv.y < 0.0 || uv.y >= 1.0) {
        // Letterbox region.
        return vec4<f32>(0.0, 0.0, 0.0, 1.0);
    }
    var color = textureSampleLevel(cbuf_texture, cbuf_sampler, uv, 0.0);
    if (params.flags.x == 1u) {
        color = vec4<f32>(pow(max(color.rgb, vec3<f32>(0.0)), vec3<f32>(1.0 / 2.2)), color.a);
    }
    return vec4<f32>(color.rgb, 1.0);
}
"#;

/// Composites the 2D canvas layer over the console framebuffer with
/// premultiplied-alpha blending (blend state lives in the pipeline).
pub const COMPOSITE: &str = r#"
@group(0) @binding(0) var canvas_texture: texture_2d<f32>;
@group(0) @binding(1) var canvas_sampler: sampler;

struct VsOut {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> VsOut {
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    var out: VsOut;
    out.position = vec4<f32>(uv * 2.0 - 1.0, 0.0, 1.0);
    out.uv = vec2<f32>(uv.x, 1.0 - uv.y);
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    // Canvas pixels are premultiplied already.
    return textureSampleLevel(canvas_texture, canvas_sampler, in.uv, 0.0);
}
"#;

/// Forward pass over the scene's draw list: metallic-roughness shading
/// with a small fixed light array.
pub const MESH: &str = r#"
struct Light {
    // xyz = position (point/spot) or unused; w = kind (0 dir, 1 point, 2 spot).
    position: vec4<f32>,
    // xyz = direction (dir/spot); w = range.
    direction: vec4<f32>,
    // rgb = color * intensity; w = cos(inner angle).
    color: vec4<f32>,
    // x = cos(outer angle).
    params: vec4<f32>,
};

struct Globals {
    view_proj: mat4x4<f32>,
    // xyz = camera position.
    eye: vec4<f32>,
    // rgb = ambient term.
    ambient: vec4<f32>,
    // x = light count.
    counts: vec4<u32>,
    lights: array<Light, 8>,
};

struct DrawUniforms {
    model: mat4x4<f32>,
    base_color: vec4<f32>,
    // x = metallic, y = roughness, z = normal scale, w = occlusion strength.
    factors: vec4<f32>,
    // rgb = emissive factor; w = alpha cutoff (< 0 disables masking).
    emissive: vec4<f32>,
};

@group(0) @binding(0) var<uniform> globals: Globals;
@group(1) @binding(0) var<uniform> draw: DrawUniforms;
@group(2) @binding(0) var base_color_tex: texture_2d<f32>;
@group(2) @binding(1) var metallic_roughness_tex: texture_2d<f32>;
@group(2) @binding(2) var normal_tex: texture_2d<f32>;
@group(2) @binding(3) var emissive_tex: texture_2d<f32>;
@group(2) @binding(4) var occlusion_tex: texture_2d<f32>;
@group(2) @binding(5) var material_sampler: sampler;

struct VsIn {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) tangent: vec4<f32>,
    @location(3) uv: vec2<f32>,
};

struct VsOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) tangent: vec4<f32>,
    @location(3) uv: vec2<f32>,
};

@vertex
fn vs_main(in: VsIn) -> VsOut {
    var out: VsOut;
    let world = draw.model * vec4<f32>(in.position, 1.0);
    out.world_pos = world.xyz;
    out.clip = globals.view_proj * world;
    out.normal = normalize((draw.model * vec4<f32>(in.normal, 0.0)).xyz);
    out.tangent = vec4<f32>(normalize((draw.model * vec4<f32>(in.tangent.xyz, 0.0)).xyz), in.tangent.w);
    out.uv = in.uv;
    return out;
}

const PI: f32 = 3.14159265359;

fn distribution_ggx(n_dot_h: f32, roughness: f32) -> f32 {
    let a = roughness * roughness;
    let a2 = a * a;
    let d = n_dot_h * n_dot_h * (a2 - 1.0) + 1.0;
    return a2 / max(PI * d * d, 1e-5);
}

fn fresnel_schlick(cos_theta: f32, f0: vec3<f32>) -> vec3<f32> {
    return f0 + (vec3<f32>(1.0) - f0) * pow(clamp(1.0 - cos_theta, 0.0, 1.0), 5.0);
}

@fragment
fn fs_main(in: VsOut, @builtin(front_facing) front_facing: bool) -> @location(0) vec4<f32> {
    let base_sample = textureSample(base_color_tex, material_sampler, in.uv);
    let base = draw.base_color * base_sample;
    if (draw.emissive.w >= 0.0 && base.a < draw.emissive.w) {
        discard;
    }

    let mr = textureSample(metallic_roughness_tex, material_sampler, in.uv);
    let metallic = clamp(draw.factors.x * mr.b, 0.0, 1.0);
    let roughness = clamp(draw.factors.y * mr.g, 0.04, 1.0);

    var n = normalize(in.normal);
    if (!front_facing) {
        n = -n;
    }
    // Normal mapping in the interpolated tangent frame.
    let t = normalize(in.tangent.xyz - n * dot(n, in.tangent.xyz));
    let b = cross(n, t) * in.tangent.w;
    let sampled = textureSample(normal_tex, material_sampler, in.uv).xyz * 2.0 - 1.0;
    let scaled = vec3<f32>(sampled.xy * draw.factors.z, sampled.z);
    n = normalize(mat3x3<f32>(t, b, n) * scaled);

    let v = normalize(globals.eye.xyz - in.world_pos);
    let f0 = mix(vec3<f32>(0.04), base.rgb, metallic);
    let diffuse_color = base.rgb * (1.0 - metallic);

    var radiance = vec3<f32>(0.0);
    let count = min(globals.counts.x, 8u);
    for (var i = 0u; i < count; i = i + 1u) {
        let light = globals.lights[i];
        var l: vec3<f32>;
        var attenuation = 1.0;
        if (light.position.w < 0.5) {
            l = normalize(-light.direction.xyz);
        } else {
            let to_light = light.position.xyz - in.world_pos;
            let dist = max(length(to_light), 1e-4);
            l = to_light / dist;
            let range = max(light.direction.w, 1e-4);
            let falloff = clamp(1.0 - pow(dist / range, 4.0), 0.0, 1.0);
            attenuation = falloff * falloff / (dist * dist);
            if (light.position.w > 1.5) {
                // Spot cone.
                let cos_angle = dot(-l, normalize(light.direction.xyz));
                let inner = light.color.w;
                let outer = light.params.x;
                attenuation = attenuation * clamp((cos_angle - outer) / max(inner - outer, 1e-4), 0.0, 1.0);
            }
        }

        let n_dot_l = max(dot(n, l), 0.0);
        if (n_dot_l <= 0.0 || attenuation <= 0.0) {
            continue;
        }
        let h = normalize(v + l);
        let n_dot_h = max(dot(n, h), 0.0);
        let d = distribution_ggx(n_dot_h, roughness);
        let f = fresnel_schlick(max(dot(h, v), 0.0), f0);
        let spec = d * f * 0.25;
        radiance = radiance + (diffuse_color / PI + spec) * light.color.rgb * n_dot_l * attenuation;
    }

    let occlusion = mix(1.0, textureSample(occlusion_tex, material_sampler, in.uv).r, draw.factors.w);
    let emissive = draw.emissive.rgb * textureSample(emissive_tex, material_sampler, in.uv).rgb;
    var color = globals.ambient.rgb * diffuse_color * occlusion + radiance + emissive;

    // Reinhard tonemap keeps the console output in range.
    if (globals.counts.y == 1u) {
        color = color / (color + vec3<f32>(1.0));
    }
    return vec4<f32>(color, base.a);
}
"#;
