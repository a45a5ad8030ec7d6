//! ONVIF SOAP XML body fragments
//!
//! All XML rendering is centralized here. Functions take snapshots cloned
//! out of the store and return the fragment placed inside `env:Body`;
//! [`crate::soap::envelope`] adds the envelope.

use std::net::{IpAddr, Ipv4Addr};

use chrono::{DateTime, Datelike, Timelike, Utc};
use config_manager::{DeviceIdentity, NetworkConfig};
use quick_xml::escape::escape;

use crate::model::{
    AudioEncoderConfiguration, AudioEncoderOptions, AudioSource, AudioSourceConfiguration,
    Counted, MetadataConfiguration, ProfileView, PtzConfiguration, PtzNode,
    VideoEncoderConfiguration, VideoEncoderOptions, VideoEncoding, VideoSource,
    VideoSourceConfiguration,
};

const PAN_TILT_VELOCITY_SPACE: &str =
    "http://www.onvif.org/ver10/tptz/PanTiltSpaces/VelocityGenericSpace";
const ZOOM_VELOCITY_SPACE: &str = "http://www.onvif.org/ver10/tptz/ZoomSpaces/VelocityGenericSpace";

/// Escape a string for safe inclusion in XML content/attributes.
/// Converts &, <, >, ", ' to their XML entity equivalents.
pub(crate) fn xml_escape(s: &str) -> String {
    escape(s).to_string()
}

/// xs:duration in whole seconds
fn duration(secs: u64) -> String {
    format!("PT{}S", secs)
}

/// `<prefix:ElementResponse>inner</prefix:ElementResponse>`, self-closed when empty
pub fn response(prefix: &str, element: &str, inner: &str) -> String {
    if inner.is_empty() {
        format!("<{}:{}Response/>", prefix, element)
    } else {
        format!(
            "<{p}:{e}Response>{inner}</{p}:{e}Response>",
            p = prefix,
            e = element,
            inner = inner
        )
    }
}

// ----- media -----

/// Media profile with every bound configuration inlined
pub fn profile(element: &str, view: &ProfileView) -> String {
    let mut inner = format!("<tt:Name>{}</tt:Name>", xml_escape(&view.name));
    if let Some(c) = &view.video_source {
        inner.push_str(&video_source_configuration("tt:VideoSourceConfiguration", c));
    }
    if let Some(c) = &view.audio_source {
        inner.push_str(&audio_source_configuration("tt:AudioSourceConfiguration", c));
    }
    if let Some(c) = &view.video_encoder {
        inner.push_str(&video_encoder_configuration("tt:VideoEncoderConfiguration", c));
    }
    if let Some(c) = &view.audio_encoder {
        inner.push_str(&audio_encoder_configuration("tt:AudioEncoderConfiguration", c));
    }
    if let Some(c) = &view.ptz {
        inner.push_str(&ptz_configuration("tt:PTZConfiguration", c));
    }
    if let Some(c) = &view.metadata {
        inner.push_str(&metadata_configuration("tt:MetadataConfiguration", c));
    }
    format!(
        r#"<{e} token="{}" fixed="{}">{}</{e}>"#,
        xml_escape(&view.token),
        view.fixed,
        inner,
        e = element
    )
}

pub fn video_source(src: &VideoSource) -> String {
    format!(
        r#"<trt:VideoSources token="{}"><tt:Framerate>{}</tt:Framerate><tt:Resolution><tt:Width>{}</tt:Width><tt:Height>{}</tt:Height></tt:Resolution></trt:VideoSources>"#,
        xml_escape(&src.token),
        src.framerate,
        src.resolution.width,
        src.resolution.height
    )
}

pub fn audio_source(src: &AudioSource) -> String {
    format!(
        r#"<trt:AudioSources token="{}"><tt:Channels>{}</tt:Channels></trt:AudioSources>"#,
        xml_escape(&src.token),
        src.channels
    )
}

pub fn video_source_configuration(element: &str, c: &Counted<VideoSourceConfiguration>) -> String {
    let cfg = &c.config;
    format!(
        r#"<{e} token="{}"><tt:Name>{}</tt:Name><tt:UseCount>{}</tt:UseCount><tt:SourceToken>{}</tt:SourceToken><tt:Bounds x="{}" y="{}" width="{}" height="{}"/></{e}>"#,
        xml_escape(&cfg.token),
        xml_escape(&cfg.name),
        c.use_count,
        xml_escape(&cfg.source_token),
        cfg.bounds.x,
        cfg.bounds.y,
        cfg.bounds.width,
        cfg.bounds.height,
        e = element
    )
}

pub fn audio_source_configuration(element: &str, c: &Counted<AudioSourceConfiguration>) -> String {
    let cfg = &c.config;
    format!(
        r#"<{e} token="{}"><tt:Name>{}</tt:Name><tt:UseCount>{}</tt:UseCount><tt:SourceToken>{}</tt:SourceToken></{e}>"#,
        xml_escape(&cfg.token),
        xml_escape(&cfg.name),
        c.use_count,
        xml_escape(&cfg.source_token),
        e = element
    )
}

pub fn video_encoder_configuration(element: &str, c: &Counted<VideoEncoderConfiguration>) -> String {
    let cfg = &c.config;
    let codec = match cfg.encoding {
        VideoEncoding::H264 => format!(
            "<tt:H264><tt:GovLength>{}</tt:GovLength><tt:H264Profile>{}</tt:H264Profile></tt:H264>",
            cfg.gov_length, cfg.h264_profile
        ),
        VideoEncoding::Mpeg4 => format!(
            "<tt:MPEG4><tt:GovLength>{}</tt:GovLength><tt:Mpeg4Profile>SP</tt:Mpeg4Profile></tt:MPEG4>",
            cfg.gov_length
        ),
        VideoEncoding::Jpeg => String::new(),
    };
    format!(
        r#"<{e} token="{}"><tt:Name>{}</tt:Name><tt:UseCount>{}</tt:UseCount><tt:Encoding>{}</tt:Encoding><tt:Resolution><tt:Width>{}</tt:Width><tt:Height>{}</tt:Height></tt:Resolution><tt:Quality>{}</tt:Quality><tt:RateControl><tt:FrameRateLimit>{}</tt:FrameRateLimit><tt:EncodingInterval>{}</tt:EncodingInterval><tt:BitrateLimit>{}</tt:BitrateLimit></tt:RateControl>{}<tt:SessionTimeout>{}</tt:SessionTimeout></{e}>"#,
        xml_escape(&cfg.token),
        xml_escape(&cfg.name),
        c.use_count,
        cfg.encoding,
        cfg.resolution.width,
        cfg.resolution.height,
        cfg.quality,
        cfg.rate_control.frame_rate_limit,
        cfg.rate_control.encoding_interval,
        cfg.rate_control.bitrate_limit,
        codec,
        duration(cfg.session_timeout_secs),
        e = element
    )
}

pub fn audio_encoder_configuration(element: &str, c: &Counted<AudioEncoderConfiguration>) -> String {
    let cfg = &c.config;
    format!(
        r#"<{e} token="{}"><tt:Name>{}</tt:Name><tt:UseCount>{}</tt:UseCount><tt:Encoding>{}</tt:Encoding><tt:Bitrate>{}</tt:Bitrate><tt:SampleRate>{}</tt:SampleRate><tt:SessionTimeout>{}</tt:SessionTimeout></{e}>"#,
        xml_escape(&cfg.token),
        xml_escape(&cfg.name),
        c.use_count,
        cfg.encoding,
        cfg.bitrate,
        cfg.sample_rate,
        duration(cfg.session_timeout_secs),
        e = element
    )
}

pub fn metadata_configuration(element: &str, c: &Counted<MetadataConfiguration>) -> String {
    let cfg = &c.config;
    format!(
        r#"<{e} token="{}"><tt:Name>{}</tt:Name><tt:UseCount>{}</tt:UseCount><tt:Analytics>{}</tt:Analytics><tt:SessionTimeout>{}</tt:SessionTimeout></{e}>"#,
        xml_escape(&cfg.token),
        xml_escape(&cfg.name),
        c.use_count,
        cfg.analytics,
        duration(cfg.session_timeout_secs),
        e = element
    )
}

pub fn ptz_configuration(element: &str, c: &Counted<PtzConfiguration>) -> String {
    let cfg = &c.config;
    format!(
        r#"<{e} token="{}"><tt:Name>{}</tt:Name><tt:UseCount>{}</tt:UseCount><tt:NodeToken>{}</tt:NodeToken><tt:DefaultContinuousPanTiltVelocitySpace>{}</tt:DefaultContinuousPanTiltVelocitySpace><tt:DefaultContinuousZoomVelocitySpace>{}</tt:DefaultContinuousZoomVelocitySpace><tt:DefaultPTZSpeed><tt:PanTilt x="{}" y="{}"/><tt:Zoom x="{}"/></tt:DefaultPTZSpeed><tt:DefaultPTZTimeout>{}</tt:DefaultPTZTimeout></{e}>"#,
        xml_escape(&cfg.token),
        xml_escape(&cfg.name),
        c.use_count,
        xml_escape(&cfg.node_token),
        PAN_TILT_VELOCITY_SPACE,
        ZOOM_VELOCITY_SPACE,
        cfg.default_speed.pan,
        cfg.default_speed.tilt,
        cfg.default_speed.zoom,
        duration(cfg.default_timeout_secs),
        e = element
    )
}

fn resolutions_available(opts: &VideoEncoderOptions) -> String {
    opts.resolutions
        .iter()
        .map(|r| {
            format!(
                "<tt:ResolutionsAvailable><tt:Width>{}</tt:Width><tt:Height>{}</tt:Height></tt:ResolutionsAvailable>",
                r.width, r.height
            )
        })
        .collect()
}

fn int_range(element: &str, min: u32, max: u32) -> String {
    format!(
        "<tt:{e}><tt:Min>{}</tt:Min><tt:Max>{}</tt:Max></tt:{e}>",
        min,
        max,
        e = element
    )
}

/// GetVideoEncoderConfigurationOptions payload
pub fn video_encoder_options(opts: &VideoEncoderOptions) -> String {
    let resolutions = resolutions_available(opts);
    let frame_rate = int_range("FrameRateRange", opts.frame_rate.min, opts.frame_rate.max);
    let interval = int_range(
        "EncodingIntervalRange",
        opts.encoding_interval.min,
        opts.encoding_interval.max,
    );
    let gov = int_range("GovLengthRange", opts.gov_length.min, opts.gov_length.max);
    let bitrate = int_range("BitrateRange", opts.bitrate.min, opts.bitrate.max);

    let mut codecs = String::new();
    let mut extension = String::new();
    for encoding in &opts.encodings {
        let tag = encoding.as_str();
        let extra = match encoding {
            VideoEncoding::Jpeg => String::new(),
            VideoEncoding::Mpeg4 => format!(
                "{}<tt:Mpeg4ProfilesSupported>SP</tt:Mpeg4ProfilesSupported>",
                gov
            ),
            VideoEncoding::H264 => {
                let profiles: String = opts
                    .h264_profiles
                    .iter()
                    .map(|p| format!("<tt:H264ProfilesSupported>{}</tt:H264ProfilesSupported>", p))
                    .collect();
                format!("{}{}", gov, profiles)
            }
        };
        codecs.push_str(&format!(
            "<tt:{t}>{}{}{}{}</tt:{t}>",
            resolutions,
            frame_rate,
            interval,
            extra,
            t = tag
        ));
        extension.push_str(&format!("<tt:{t}>{}</tt:{t}>", bitrate, t = tag));
    }

    format!(
        "<trt:Options><tt:QualityRange><tt:Min>{}</tt:Min><tt:Max>{}</tt:Max></tt:QualityRange>{}<tt:Extension>{}</tt:Extension></trt:Options>",
        opts.quality.min, opts.quality.max, codecs, extension
    )
}

/// GetAudioEncoderConfigurationOptions payload
pub fn audio_encoder_options(opts: &AudioEncoderOptions) -> String {
    let join = |items: &[u32]| {
        items
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    };
    let bitrates = join(&opts.bitrates);
    let sample_rates = join(&opts.sample_rates);
    let options: String = opts
        .encodings
        .iter()
        .map(|e| {
            format!(
                "<tt:Options><tt:Encoding>{}</tt:Encoding><tt:BitrateList><tt:Items>{}</tt:Items></tt:BitrateList><tt:SampleRateList><tt:Items>{}</tt:Items></tt:SampleRateList></tt:Options>",
                e, bitrates, sample_rates
            )
        })
        .collect();
    format!("<trt:Options>{}</trt:Options>", options)
}

/// Stream or snapshot URI payload
pub fn media_uri(uri: &str) -> String {
    format!(
        r#"<trt:MediaUri><tt:Uri>{}</tt:Uri><tt:InvalidAfterConnect>false</tt:InvalidAfterConnect><tt:InvalidAfterReboot>false</tt:InvalidAfterReboot><tt:Timeout>PT0S</tt:Timeout></trt:MediaUri>"#,
        xml_escape(uri)
    )
}

pub fn media_service_capabilities() -> &'static str {
    r#"<trt:Capabilities SnapshotUri="true" Rotation="false" VideoSourceMode="false" OSD="false"><trt:StreamingCapabilities RTPMulticast="false" RTP_TCP="true" RTP_RTSP_TCP="true" NonAggregateControl="false"/></trt:Capabilities>"#
}

// ----- device -----

pub fn device_information(identity: &DeviceIdentity) -> String {
    format!(
        "<tds:Manufacturer>{}</tds:Manufacturer><tds:Model>{}</tds:Model><tds:FirmwareVersion>{}</tds:FirmwareVersion><tds:SerialNumber>{}</tds:SerialNumber><tds:HardwareId>{}</tds:HardwareId>",
        xml_escape(&identity.manufacturer),
        xml_escape(&identity.model),
        xml_escape(&identity.firmware_version),
        xml_escape(&identity.serial_number),
        xml_escape(&identity.hardware_id)
    )
}

pub fn system_date_and_time(now: DateTime<Utc>) -> String {
    format!(
        "<tds:SystemDateAndTime><tt:DateTimeType>Manual</tt:DateTimeType><tt:DaylightSavings>false</tt:DaylightSavings><tt:TimeZone><tt:TZ>UTC0</tt:TZ></tt:TimeZone><tt:UTCDateTime><tt:Time><tt:Hour>{}</tt:Hour><tt:Minute>{}</tt:Minute><tt:Second>{}</tt:Second></tt:Time><tt:Date><tt:Year>{}</tt:Year><tt:Month>{}</tt:Month><tt:Day>{}</tt:Day></tt:Date></tt:UTCDateTime></tds:SystemDateAndTime>",
        now.hour(),
        now.minute(),
        now.second(),
        now.year(),
        now.month(),
        now.day()
    )
}

pub fn scopes(items: &[String]) -> String {
    items
        .iter()
        .map(|s| {
            format!(
                "<tds:Scopes><tt:ScopeDef>Fixed</tt:ScopeDef><tt:ScopeItem>{}</tt:ScopeItem></tds:Scopes>",
                xml_escape(s)
            )
        })
        .collect()
}

/// Legacy GetCapabilities entries for the requested services
pub fn capabilities(device_xaddr: Option<&str>, media_xaddr: Option<&str>, ptz_xaddr: Option<&str>) -> String {
    let mut inner = String::new();
    if let Some(xaddr) = device_xaddr {
        inner.push_str(&format!(
            "<tt:Device><tt:XAddr>{}</tt:XAddr><tt:System><tt:DiscoveryResolve>false</tt:DiscoveryResolve><tt:DiscoveryBye>true</tt:DiscoveryBye><tt:RemoteDiscovery>false</tt:RemoteDiscovery><tt:SystemBackup>false</tt:SystemBackup><tt:SystemLogging>false</tt:SystemLogging><tt:FirmwareUpgrade>false</tt:FirmwareUpgrade></tt:System></tt:Device>",
            xml_escape(xaddr)
        ));
    }
    if let Some(xaddr) = media_xaddr {
        inner.push_str(&format!(
            "<tt:Media><tt:XAddr>{}</tt:XAddr><tt:StreamingCapabilities><tt:RTPMulticast>false</tt:RTPMulticast><tt:RTP_TCP>true</tt:RTP_TCP><tt:RTP_RTSP_TCP>true</tt:RTP_RTSP_TCP></tt:StreamingCapabilities></tt:Media>",
            xml_escape(xaddr)
        ));
    }
    if let Some(xaddr) = ptz_xaddr {
        inner.push_str(&format!(
            "<tt:PTZ><tt:XAddr>{}</tt:XAddr></tt:PTZ>",
            xml_escape(xaddr)
        ));
    }
    format!("<tds:Capabilities>{}</tds:Capabilities>", inner)
}

/// Service entry for GetServices
pub fn service_entry(namespace: &str, xaddr: &str, capabilities: Option<&str>) -> String {
    let caps = capabilities
        .map(|c| format!("<tds:Capabilities>{}</tds:Capabilities>", c))
        .unwrap_or_default();
    format!(
        "<tds:Service><tds:Namespace>{}</tds:Namespace><tds:XAddr>{}</tds:XAddr>{}<tds:Version><tt:Major>2</tt:Major><tt:Minor>0</tt:Minor></tds:Version></tds:Service>",
        namespace,
        xml_escape(xaddr),
        caps
    )
}

pub fn device_service_capabilities(discoverable: bool) -> String {
    format!(
        r#"<tds:Capabilities><tds:Network IPFilter="false" ZeroConfiguration="false" IPVersion6="false" DynDNS="false" HostnameFromDHCP="false"/><tds:Security TLS1.2="false" UsernameToken="false" HttpDigest="false"/><tds:System DiscoveryResolve="false" DiscoveryBye="{}" RemoteDiscovery="false" SystemBackup="false" SystemLogging="false" FirmwareUpgrade="false"/></tds:Capabilities>"#,
        discoverable
    )
}

pub fn hostname(name: &str) -> String {
    format!(
        "<tds:HostnameInformation><tt:FromDHCP>false</tt:FromDHCP><tt:Name>{}</tt:Name></tds:HostnameInformation>",
        xml_escape(name)
    )
}

pub fn discovery_mode(discoverable: bool) -> String {
    let mode = if discoverable { "Discoverable" } else { "NonDiscoverable" };
    format!("<tds:DiscoveryMode>{}</tds:DiscoveryMode>", mode)
}

fn ip_address(addr: &IpAddr) -> String {
    match addr {
        IpAddr::V4(v4) => format!("<tt:Type>IPv4</tt:Type><tt:IPv4Address>{}</tt:IPv4Address>", v4),
        IpAddr::V6(v6) => format!("<tt:Type>IPv6</tt:Type><tt:IPv6Address>{}</tt:IPv6Address>", v6),
    }
}

/// One manually configured interface; IPv4 is omitted when the advertised
/// host is not an IPv4 address
pub fn network_interface(net: &NetworkConfig, address: Option<Ipv4Addr>) -> String {
    let ipv4 = address
        .map(|addr| {
            format!(
                "<tt:IPv4><tt:Enabled>true</tt:Enabled><tt:Config><tt:Manual><tt:Address>{}</tt:Address><tt:PrefixLength>{}</tt:PrefixLength></tt:Manual><tt:DHCP>false</tt:DHCP></tt:Config></tt:IPv4>",
                addr, net.prefix_length
            )
        })
        .unwrap_or_default();
    format!(
        r#"<tds:NetworkInterfaces token="{token}"><tt:Enabled>true</tt:Enabled><tt:Info><tt:Name>{token}</tt:Name><tt:HwAddress>{}</tt:HwAddress><tt:MTU>{}</tt:MTU></tt:Info>{}</tds:NetworkInterfaces>"#,
        xml_escape(&net.hw_address),
        net.mtu,
        ipv4,
        token = xml_escape(&net.interface)
    )
}

pub fn dns(net: &NetworkConfig) -> String {
    let manual: String = net
        .dns
        .iter()
        .map(|addr| format!("<tt:DNSManual>{}</tt:DNSManual>", ip_address(addr)))
        .collect();
    format!(
        "<tds:DNSInformation><tt:FromDHCP>false</tt:FromDHCP>{}</tds:DNSInformation>",
        manual
    )
}

/// Servers that parse as addresses are typed by family, the rest are DNS names
pub fn ntp(net: &NetworkConfig) -> String {
    let manual: String = net
        .ntp
        .iter()
        .map(|server| match server.parse::<IpAddr>() {
            Ok(addr) => format!("<tt:NTPManual>{}</tt:NTPManual>", ip_address(&addr)),
            Err(_) => format!(
                "<tt:NTPManual><tt:Type>DNS</tt:Type><tt:DNSname>{}</tt:DNSname></tt:NTPManual>",
                xml_escape(server)
            ),
        })
        .collect();
    format!(
        "<tds:NTPInformation><tt:FromDHCP>false</tt:FromDHCP>{}</tds:NTPInformation>",
        manual
    )
}

pub fn network_gateway(gateway: Option<Ipv4Addr>) -> String {
    match gateway {
        Some(addr) => format!(
            "<tds:NetworkGateway><tt:IPv4Address>{}</tt:IPv4Address></tds:NetworkGateway>",
            addr
        ),
        None => "<tds:NetworkGateway/>".to_string(),
    }
}

pub fn network_protocols(http_port: u16) -> String {
    format!(
        "<tds:NetworkProtocols><tt:Name>HTTP</tt:Name><tt:Enabled>true</tt:Enabled><tt:Port>{}</tt:Port></tds:NetworkProtocols>",
        http_port
    )
}

pub fn zero_configuration(interface: &str) -> String {
    format!(
        "<tds:ZeroConfiguration><tt:InterfaceToken>{}</tt:InterfaceToken><tt:Enabled>false</tt:Enabled></tds:ZeroConfiguration>",
        xml_escape(interface)
    )
}

// ----- ptz -----

fn supported_spaces() -> String {
    format!(
        r#"<tt:ContinuousPanTiltVelocitySpace><tt:URI>{}</tt:URI><tt:XRange><tt:Min>-1</tt:Min><tt:Max>1</tt:Max></tt:XRange><tt:YRange><tt:Min>-1</tt:Min><tt:Max>1</tt:Max></tt:YRange></tt:ContinuousPanTiltVelocitySpace><tt:ContinuousZoomVelocitySpace><tt:URI>{}</tt:URI><tt:XRange><tt:Min>-1</tt:Min><tt:Max>1</tt:Max></tt:XRange></tt:ContinuousZoomVelocitySpace>"#,
        PAN_TILT_VELOCITY_SPACE, ZOOM_VELOCITY_SPACE
    )
}

pub fn ptz_node(node: &PtzNode) -> String {
    format!(
        r#"<tptz:PTZNode token="{}" FixedHomePosition="false"><tt:Name>{}</tt:Name><tt:SupportedPTZSpaces>{}</tt:SupportedPTZSpaces><tt:MaximumNumberOfPresets>{}</tt:MaximumNumberOfPresets><tt:HomeSupported>{}</tt:HomeSupported></tptz:PTZNode>"#,
        xml_escape(&node.token),
        xml_escape(&node.name),
        supported_spaces(),
        node.max_presets,
        node.home_supported
    )
}

pub fn ptz_configuration_options(max_timeout_secs: u64) -> String {
    format!(
        "<tptz:PTZConfigurationOptions><tt:Spaces>{}</tt:Spaces><tt:PTZTimeout><tt:Min>PT1S</tt:Min><tt:Max>{}</tt:Max></tt:PTZTimeout></tptz:PTZConfigurationOptions>",
        supported_spaces(),
        duration(max_timeout_secs)
    )
}

/// Idle at the origin; the emulator has no motor
pub fn ptz_status(now: DateTime<Utc>) -> String {
    format!(
        r#"<tptz:PTZStatus><tt:Position><tt:PanTilt x="0" y="0" space="http://www.onvif.org/ver10/tptz/PanTiltSpaces/PositionGenericSpace"/><tt:Zoom x="0" space="http://www.onvif.org/ver10/tptz/ZoomSpaces/PositionGenericSpace"/></tt:Position><tt:MoveStatus><tt:PanTilt>IDLE</tt:PanTilt><tt:Zoom>IDLE</tt:Zoom></tt:MoveStatus><tt:UtcTime>{}</tt:UtcTime></tptz:PTZStatus>"#,
        now.format("%Y-%m-%dT%H:%M:%SZ")
    )
}

pub fn ptz_service_capabilities() -> &'static str {
    r#"<tptz:Capabilities EFlip="false" Reverse="false" GetCompatibleConfigurations="false" MoveStatus="true" StatusPosition="true"/>"#
}

// ----- discovery -----

/// WS-Discovery ProbeMatches envelope answering one Probe
pub fn probe_matches(
    message_id: &str,
    relates_to: &str,
    endpoint: &str,
    scopes: &[String],
    xaddr: &str,
) -> String {
    let scopes = scopes
        .iter()
        .map(|s| xml_escape(s))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<env:Envelope xmlns:env="http://www.w3.org/2003/05/soap-envelope"
              xmlns:wsa="http://schemas.xmlsoap.org/ws/2004/08/addressing"
              xmlns:d="http://schemas.xmlsoap.org/ws/2005/04/discovery"
              xmlns:dn="http://www.onvif.org/ver10/network/wsdl"
              xmlns:tds="http://www.onvif.org/ver10/device/wsdl">
  <env:Header>
    <wsa:MessageID>urn:uuid:{}</wsa:MessageID>
    <wsa:RelatesTo>{}</wsa:RelatesTo>
    <wsa:To>http://schemas.xmlsoap.org/ws/2004/08/addressing/role/anonymous</wsa:To>
    <wsa:Action>http://schemas.xmlsoap.org/ws/2005/04/discovery/ProbeMatches</wsa:Action>
  </env:Header>
  <env:Body>
    <d:ProbeMatches>
      <d:ProbeMatch>
        <wsa:EndpointReference><wsa:Address>urn:uuid:{}</wsa:Address></wsa:EndpointReference>
        <d:Types>dn:NetworkVideoTransmitter tds:Device</d:Types>
        <d:Scopes>{}</d:Scopes>
        <d:XAddrs>{}</d:XAddrs>
        <d:MetadataVersion>1</d:MetadataVersion>
      </d:ProbeMatch>
    </d:ProbeMatches>
  </env:Body>
</env:Envelope>"#,
        xml_escape(message_id),
        xml_escape(relates_to),
        xml_escape(endpoint),
        scopes,
        xml_escape(xaddr)
    )
}
